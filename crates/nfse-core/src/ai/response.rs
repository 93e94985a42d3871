//! Conversion of model answers into [`Nfse`] records.
//!
//! Models do not always follow the requested types: amounts may come back
//! as strings in Brazilian format, identifiers as numbers, dates with or
//! without a time. Every field is therefore read leniently.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AiError;
use crate::models::nfse::*;
use crate::parser::text::{non_empty, parse_brl_amount, parse_datetime, parse_percentage};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNfse {
    header: RawHeader,
    provider: Option<RawCompany>,
    taker: Option<RawCompany>,
    service: Option<RawService>,
    values: Option<RawValues>,
    federal_taxes: Option<RawFederalTaxes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHeader {
    number: Value,
    issued_at: Value,
    competence: Value,
    verification_code: Value,
    rps_number: Value,
    service_location: Value,
    origin: Value,
    agency: Value,
    replaced_nfse: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCompany {
    legal_name: Value,
    cnpj: Value,
    municipal_registration: Value,
    state_registration: Value,
    trade_name: Value,
    address: Option<RawAddress>,
    contact: Option<RawContact>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAddress {
    street: Value,
    number: Value,
    district: Value,
    postal_code: Value,
    city: Value,
    state: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContact {
    phone: Value,
    email: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawService {
    description: Value,
    service_code: Value,
    activity_description: Value,
    cnae: Value,
    cnae_description: Value,
    notes: Value,
    construction: Option<RawConstruction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConstruction {
    work_code: Value,
    art_code: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawValues {
    service_amount: Value,
    discount: Value,
    net_amount: Value,
    tax_base: Value,
    iss_rate: Value,
    iss_amount: Value,
    other_withholdings: Value,
    federal_withholdings: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFederalTaxes {
    pis: Value,
    cofins: Value,
    ir: Value,
    inss: Value,
    csll: Value,
}

/// Remove markdown code fences and surrounding prose from a model answer.
pub fn strip_code_fences(answer: &str) -> &str {
    let trimmed = answer.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim(),
    }
}

/// Parse a model answer into an NFSe.
///
/// Missing pieces get the same placeholders as the rule-based parser and
/// are listed in `metadata.missing_fields`.
pub fn parse_model_json(answer: &str) -> Result<Nfse, AiError> {
    let json = strip_code_fences(answer);
    let raw: RawNfse = serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(80).collect();
        AiError::InvalidJson(format!("{} (answer starts with {:?})", e, preview))
    })?;

    Ok(raw.into_nfse())
}

impl RawNfse {
    fn into_nfse(self) -> Nfse {
        let mut missing = Vec::new();
        let h = self.header;

        let header = NfseHeader {
            number: text(&h.number),
            issued_at: datetime(&h.issued_at),
            competence: text(&h.competence),
            verification_code: text(&h.verification_code).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            rps_number: text(&h.rps_number).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            service_location: text(&h.service_location).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            origin: text(&h.origin),
            agency: text(&h.agency),
            replaced_nfse: text(&h.replaced_nfse),
        };

        if header.number.is_none() {
            missing.push("header.number");
        }
        if header.issued_at.is_none() {
            missing.push("header.issued_at");
        }
        if header.verification_code == NOT_AVAILABLE {
            missing.push("header.verification_code");
        }

        let provider = self.provider.map(RawCompany::into_company).filter(Company::is_known);
        if provider.is_none() {
            missing.push("provider");
        }
        let taker = self.taker.map(RawCompany::into_company).filter(Company::is_known);
        if taker.is_none() {
            missing.push("taker");
        }

        let service = self.service.map(RawService::into_service);
        if service.is_none() {
            missing.push("service");
        }

        let values = match self.values {
            Some(v) => v.into_values(),
            None => {
                missing.push("values");
                Values::default()
            }
        };

        let federal_taxes = self
            .federal_taxes
            .map(RawFederalTaxes::into_taxes)
            .unwrap_or_default();

        let confidence = (1.0 - 0.1 * missing.len() as f32).clamp(0.0, 1.0);

        Nfse {
            header,
            provider: provider.unwrap_or_default(),
            taker: taker.unwrap_or_default(),
            service: service.unwrap_or_default(),
            values,
            federal_taxes,
            metadata: ExtractionMetadata {
                parse_mode: ParseMode::Ai,
                confidence,
                missing_fields: missing.into_iter().map(String::from).collect(),
                ..ExtractionMetadata::default()
            },
        }
    }
}

impl RawCompany {
    fn into_company(self) -> Company {
        let address = self.address.map(|a| Address {
            street: text(&a.street).unwrap_or_default(),
            number: text(&a.number).unwrap_or_default(),
            district: text(&a.district),
            postal_code: text(&a.postal_code),
            city: text(&a.city),
            state: text(&a.state),
        });

        let contact = self
            .contact
            .and_then(|c| Contact::from_parts(text(&c.phone), text(&c.email)));

        Company {
            legal_name: text(&self.legal_name).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            cnpj: text(&self.cnpj).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            municipal_registration: text(&self.municipal_registration),
            state_registration: text(&self.state_registration),
            trade_name: text(&self.trade_name),
            address: address.filter(|a| !a.is_empty()),
            contact,
        }
    }
}

impl RawService {
    fn into_service(self) -> ServiceDetail {
        let construction = self
            .construction
            .map(|c| CivilConstruction {
                work_code: text(&c.work_code),
                art_code: text(&c.art_code),
            })
            .filter(|c| c.work_code.is_some() || c.art_code.is_some());

        ServiceDetail {
            description: text(&self.description).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            service_code: text(&self.service_code),
            activity_description: text(&self.activity_description),
            cnae: text(&self.cnae),
            cnae_description: text(&self.cnae_description),
            notes: text(&self.notes),
            construction,
        }
    }
}

impl RawValues {
    fn into_values(self) -> Values {
        Values {
            service_amount: money(&self.service_amount),
            discount: money(&self.discount),
            net_amount: money(&self.net_amount),
            tax_base: money(&self.tax_base),
            iss_rate: rate(&self.iss_rate),
            iss_amount: money(&self.iss_amount),
            other_withholdings: money(&self.other_withholdings),
            federal_withholdings: money(&self.federal_withholdings),
        }
    }
}

impl RawFederalTaxes {
    fn into_taxes(self) -> FederalTaxes {
        FederalTaxes {
            pis: money(&self.pis),
            cofins: money(&self.cofins),
            ir: money(&self.ir),
            inss: money(&self.inss),
            csll: money(&self.csll),
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("null") => None,
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) if s.contains(',') => parse_brl_amount(s),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// Amount with two decimal places; missing or unreadable values are zero.
fn money(value: &Value) -> Decimal {
    match decimal(value) {
        Some(mut d) => {
            d.rescale(2);
            d
        }
        None => zero(),
    }
}

/// Rate as a fraction. Values of 1 or more, or written with `%`, are
/// percentages; ISS never reaches 100%.
fn rate(value: &Value) -> Decimal {
    let parsed = match value {
        Value::String(s) if s.contains('%') => parse_percentage(s),
        other => decimal(other).map(|d| if d >= Decimal::ONE { d / Decimal::ONE_HUNDRED } else { d }),
    };
    parsed.unwrap_or_else(zero)
}

fn datetime(value: &Value) -> Option<NaiveDateTime> {
    let s = text(value)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    parse_datetime(&s)
}
