//! Rendering of extracted records for stdout.

use nfse_core::Nfse;
use nfse_core::models::nfse::Company;
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
    /// CSV output
    Csv,
}

pub fn format_nfse(nfse: &Nfse, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(nfse)?),
        OutputFormat::Text => Ok(format_text(nfse)),
        OutputFormat::Csv => format_csv(nfse),
    }
}

fn format_csv(nfse: &Nfse) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "number",
        "issued_at",
        "verification_code",
        "provider_name",
        "provider_cnpj",
        "taker_name",
        "taker_cnpj",
        "service_amount",
        "net_amount",
        "iss_rate",
        "iss_amount",
        "confidence",
    ])?;

    wtr.write_record([
        nfse.header.number.clone().unwrap_or_default(),
        nfse.header
            .issued_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        nfse.header.verification_code.clone(),
        nfse.provider.legal_name.clone(),
        nfse.provider.cnpj.clone(),
        nfse.taker.legal_name.clone(),
        nfse.taker.cnpj.clone(),
        nfse.values.service_amount.to_string(),
        nfse.values.net_amount.to_string(),
        nfse.values.iss_rate.to_string(),
        nfse.values.iss_amount.to_string(),
        format!("{:.2}", nfse.metadata.confidence),
    ])?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(nfse: &Nfse) -> String {
    let mut output = String::new();
    let header = &nfse.header;

    output.push_str(&format!(
        "NFS-e: {}\n",
        header.number.as_deref().unwrap_or("N/A")
    ));
    if let Some(issued_at) = header.issued_at {
        output.push_str(&format!("Issued: {}\n", issued_at.format("%d/%m/%Y %H:%M")));
    }
    if let Some(competence) = &header.competence {
        output.push_str(&format!("Competence: {}\n", competence));
    }
    output.push_str(&format!("Verification code: {}\n", header.verification_code));
    output.push('\n');

    push_company(&mut output, "Provider", &nfse.provider);
    push_company(&mut output, "Taker", &nfse.taker);

    output.push_str("Service:\n");
    output.push_str(&format!("  {}\n", nfse.service.description));
    if let Some(code) = &nfse.service.service_code {
        output.push_str(&format!("  Code: {}\n", code));
    }
    output.push('\n');

    let values = &nfse.values;
    output.push_str("Values:\n");
    output.push_str(&format!("  Service:  R$ {}\n", values.service_amount));
    output.push_str(&format!("  Discount: R$ {}\n", values.discount));
    output.push_str(&format!("  Net:      R$ {}\n", values.net_amount));
    output.push_str(&format!(
        "  ISS:      R$ {} ({}% of R$ {})\n",
        values.iss_amount,
        (values.iss_rate * Decimal::ONE_HUNDRED).normalize(),
        values.tax_base
    ));

    let federal = nfse.federal_taxes.total();
    if !federal.is_zero() {
        output.push_str(&format!("  Federal:  R$ {}\n", federal));
    }

    output.push_str(&format!(
        "\nConfidence: {:.0}%\n",
        nfse.metadata.confidence * 100.0
    ));

    output
}

fn push_company(output: &mut String, title: &str, company: &Company) {
    output.push_str(&format!("{}:\n", title));
    output.push_str(&format!("  {}\n", company.legal_name));
    output.push_str(&format!("  CNPJ/CPF: {}\n", company.cnpj));
    if let Some(address) = &company.address {
        output.push_str(&format!("  {}\n", address.format()));
    }
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Nfse {
        let mut nfse = Nfse::new();
        nfse.header.number = Some("29".to_string());
        nfse.header.verification_code = "XYZ123".to_string();
        nfse.provider.legal_name = "EMPRESA, FICTÍCIA LTDA".to_string();
        nfse.values.service_amount = Decimal::new(150000, 2);
        nfse.values.iss_rate = Decimal::new(2, 2);
        nfse.values.iss_amount = Decimal::new(3000, 2);
        nfse
    }

    #[test]
    fn test_csv_quotes_fields() {
        let csv = format_nfse(&sample(), OutputFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("number,issued_at,verification_code"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("29,,XYZ123,\"EMPRESA, FICTÍCIA LTDA\",N/A"));
        assert!(row.contains(",1500.00,"));
    }

    #[test]
    fn test_text_summary() {
        let text = format_nfse(&sample(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("NFS-e: 29\n"));
        assert!(text.contains("ISS:      R$ 30.00 (2% of R$ 0.00)"));
        assert!(!text.contains("Federal:"));
    }

    #[test]
    fn test_json_is_the_record() {
        let json = format_nfse(&sample(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["header"]["number"], "29");
        assert_eq!(value["values"]["service_amount"], "1500.00");
    }
}
