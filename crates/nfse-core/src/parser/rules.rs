//! Deterministic, label-driven NFSe parser.

use std::time::Instant;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::nfse::*;

use super::documents::validate_document;
use super::patterns::*;
use super::text::{
    clean_text, extract_cnpj_cpf, non_empty, parse_brl_amount, parse_datetime, parse_percentage,
    section, slice_between, slice_until,
};
use super::{ExtractionResult, NfseParser, Result};

/// Rule-based NFSe parser working on the standard municipal layout.
pub struct RuleBasedParser {
    /// Whether to check CNPJ/CPF check digits.
    validate_documents: bool,
}

impl RuleBasedParser {
    /// Create a new parser with default settings.
    pub fn new() -> Self {
        Self {
            validate_documents: true,
        }
    }

    /// Set CNPJ/CPF check digit validation.
    pub fn with_document_validation(mut self, validate: bool) -> Self {
        self.validate_documents = validate;
        self
    }

    fn extract_header(&self, text: &str) -> NfseHeader {
        let origin = slice_between(text, &ORIGIN_START, &ORIGIN_STOP)
            .and_then(non_empty)
            .map(|o| format!("Prefeitura Municipal de {}", o));

        let agency = slice_between(text, &AGENCY_START, &AGENCY_STOP)
            .and_then(non_empty)
            .map(|a| format!("Secretaria Municipal de {}", a));

        let number = NFSE_NUMBER.captures(text).map(|c| c[1].to_string());

        let issued_at = slice_between(text, &ISSUED_AT_START, &ISSUED_AT_STOP).and_then(parse_datetime);

        let labeled = |start: &Regex, stop: &Regex| slice_between(text, start, stop).and_then(non_empty);

        NfseHeader {
            number,
            issued_at,
            competence: labeled(&COMPETENCE_START, &COMPETENCE_STOP),
            verification_code: slice_between(text, &VERIFICATION_START, &VERIFICATION_STOP)
                .and_then(|v| v.split_whitespace().next())
                .and_then(non_empty)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            rps_number: labeled(&RPS_START, &RPS_STOP).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            service_location: labeled(&LOCATION_START, &LOCATION_STOP)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            origin,
            agency,
            replaced_nfse: labeled(&REPLACED_START, &REPLACED_STOP),
        }
    }

    fn extract_company(&self, text: &str, start: &Regex, end: &Regex) -> Option<Company> {
        let section = section(text, start, end)?;
        let field = |label: &Regex| slice_between(section, label, &COMPANY_FIELD_STOP).and_then(non_empty);

        let municipal_registration = field(&MUNICIPAL_REGISTRATION)
            .map(|v| v.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
            .filter(|v| !v.is_empty());

        let state_registration = STATE_REGISTRATION
            .captures(section)
            .and_then(|c| non_empty(&c[1]));

        let email = slice_between(section, &EMAIL_LABEL, &COMPANY_FIELD_STOP)
            .and_then(|v| EMAIL.find(v))
            .map(|m| m.as_str().to_string());

        Some(Company {
            legal_name: field(&LEGAL_NAME).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            cnpj: extract_cnpj_cpf(section).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            municipal_registration,
            state_registration,
            trade_name: field(&TRADE_NAME),
            address: self.extract_address(section),
            contact: Contact::from_parts(field(&PHONE), email),
        })
    }

    fn extract_address(&self, section: &str) -> Option<Address> {
        let city_state = CITY_STATE.captures(section);
        let line = slice_between(section, &ADDRESS_START, &ADDRESS_STOP);

        if line.is_none() && city_state.is_none() {
            return None;
        }

        let mut address = Address::default();
        if let Some(caps) = &city_state {
            address.city = non_empty(&caps[1]);
            address.state = Some(caps[2].to_string());
        }

        if let Some(line) = line {
            match STREET_NUMBER.captures(line) {
                Some(caps) => {
                    address.street = caps[1].trim().trim_end_matches(',').trim().to_string();
                    address.number = caps[2].to_string();
                }
                None => address.street = line.to_string(),
            }

            address.district = DISTRICT
                .captures(line)
                .and_then(|c| non_empty(&c[1]))
                .filter(|d| !d.contains("CEP"));

            address.postal_code = POSTAL_CODE.captures(line).map(|c| c[1].to_string());
        }

        Some(address)
    }

    fn extract_service(&self, text: &str) -> Option<ServiceDetail> {
        let section = section(text, &SERVICE_SECTION, &SERVICE_END)?;

        let description = slice_between(section, &DESCRIPTION_START, &DESCRIPTION_STOP)
            .and_then(non_empty)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let (service_code, activity_description) = match SERVICE_CODE.captures(section) {
            Some(caps) => {
                let end = caps.get(0).map(|m| m.end()).unwrap_or(section.len());
                (
                    non_empty(&caps[1]),
                    non_empty(slice_until(&section[end..], &ACTIVITY_STOP)),
                )
            }
            None => (None, None),
        };

        let (cnae, cnae_description) = match CNAE.captures(section) {
            Some(caps) => {
                let end = caps.get(0).map(|m| m.end()).unwrap_or(section.len());
                (
                    non_empty(&caps[1]),
                    non_empty(slice_until(&section[end..], &CNAE_STOP)),
                )
            }
            None => (None, None),
        };

        let notes = NOTES.find(section).and_then(|m| non_empty(m.as_str()));

        let construction = CivilConstruction {
            work_code: WORK_CODE.captures(section).and_then(|c| non_empty(&c[1])),
            art_code: ART_CODE.captures(section).and_then(|c| non_empty(&c[1])),
        };
        let construction = if construction.work_code.is_none() && construction.art_code.is_none() {
            None
        } else {
            Some(construction)
        };

        Some(ServiceDetail {
            description,
            service_code,
            activity_description,
            cnae,
            cnae_description,
            notes,
            construction,
        })
    }

    fn extract_federal_taxes(&self, text: &str) -> Option<FederalTaxes> {
        let section = section(text, &FEDERAL_SECTION, &VALUES_SECTION)?;
        let tax = |re: &Regex| amount(re, section).unwrap_or_else(zero);

        Some(FederalTaxes {
            pis: tax(&PIS),
            cofins: tax(&COFINS),
            ir: tax(&IR),
            inss: tax(&INSS),
            csll: tax(&CSLL),
        })
    }

    /// Values plus the names of amounts that were not found.
    fn extract_values(&self, text: &str) -> Option<(Values, Vec<&'static str>)> {
        let start = VALUES_SECTION.find(text)?.start();
        let section = &text[start..];
        let mut missing = Vec::new();

        let mut required = |name: &'static str, re: &Regex| {
            amount(re, section).unwrap_or_else(|| {
                missing.push(name);
                zero()
            })
        };

        let service_amount = required("values.service_amount", &SERVICE_AMOUNT);
        let net_amount = required("values.net_amount", &NET_AMOUNT);
        let tax_base = required("values.tax_base", &TAX_BASE);
        let iss_amount = required("values.iss_amount", &ISS_AMOUNT);

        let iss_rate = ISS_RATE.captures(section).and_then(|c| parse_percentage(&c[1]));
        if iss_rate.is_none() {
            missing.push("values.iss_rate");
        }

        let values = Values {
            service_amount,
            discount: amount(&DISCOUNT, section).unwrap_or_else(zero),
            net_amount,
            tax_base,
            iss_rate: iss_rate.unwrap_or_else(zero),
            iss_amount,
            other_withholdings: amount(&OTHER_WITHHOLDINGS, section).unwrap_or_else(zero),
            federal_withholdings: amount(&FEDERAL_WITHHOLDINGS, section).unwrap_or_else(zero),
        };

        Some((values, missing))
    }
}

fn amount(re: &Regex, text: &str) -> Option<Decimal> {
    re.captures(text).and_then(|c| parse_brl_amount(&c[1]))
}

impl Default for RuleBasedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NfseParser for RuleBasedParser {
    fn parse(&self, text: &str) -> Result<ExtractionResult> {
        let start = Instant::now();
        let cleaned = clean_text(text);

        if cleaned.is_empty() {
            return Err(ExtractionError::NoData);
        }

        info!("Parsing NFSe from {} characters of text", cleaned.len());

        let mut warnings = Vec::new();
        let mut missing_fields: Vec<String> = Vec::new();
        let mut confidence = 1.0f32;

        let header = self.extract_header(&cleaned);
        if header.number.is_none() {
            warnings.push("Missing NFS-e number".to_string());
            missing_fields.push("header.number".to_string());
            confidence -= 0.15;
        }
        if header.issued_at.is_none() {
            missing_fields.push("header.issued_at".to_string());
            confidence -= 0.05;
        }
        if header.verification_code == NOT_AVAILABLE {
            missing_fields.push("header.verification_code".to_string());
            confidence -= 0.1;
        }

        let provider = self.extract_company(&cleaned, &PROVIDER_SECTION, &TAKER_SECTION);
        if provider.is_none() {
            warnings.push("Missing provider information".to_string());
            missing_fields.push("provider".to_string());
            confidence -= 0.25;
        }

        let taker = self.extract_company(&cleaned, &TAKER_SECTION, &SERVICE_SECTION);
        if taker.is_none() {
            warnings.push("Could not find taker section".to_string());
            missing_fields.push("taker".to_string());
            confidence -= 0.1;
        }

        let service = self.extract_service(&cleaned);
        if service.is_none() {
            warnings.push("Could not find service section".to_string());
            missing_fields.push("service".to_string());
            confidence -= 0.1;
        }

        let federal_taxes = self.extract_federal_taxes(&cleaned).unwrap_or_default();

        let values = match self.extract_values(&cleaned) {
            Some((values, missing)) => {
                confidence -= 0.05 * missing.len() as f32;
                missing_fields.extend(missing.into_iter().map(String::from));
                values
            }
            None => {
                warnings.push("Could not find values section".to_string());
                missing_fields.push("values".to_string());
                confidence -= 0.25;
                Values::default()
            }
        };

        let mut nfse = Nfse {
            header,
            provider: provider.unwrap_or_default(),
            taker: taker.unwrap_or_default(),
            service: service.unwrap_or_default(),
            values,
            federal_taxes,
            metadata: ExtractionMetadata::default(),
        };

        let mut issues = nfse.consistency_issues();
        if self.validate_documents {
            for company in [&nfse.provider, &nfse.taker] {
                if company.cnpj != NOT_AVAILABLE && !validate_document(&company.cnpj) {
                    confidence -= 0.05;
                }
            }
            issues.extend(nfse.document_issues());
        }
        for issue in issues {
            if !warnings.contains(&issue) {
                warnings.push(issue);
            }
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        nfse.metadata = ExtractionMetadata {
            parse_mode: ParseMode::Rules,
            confidence: confidence.clamp(0.0, 1.0),
            processing_time_ms: Some(processing_time_ms),
            warnings: warnings.clone(),
            missing_fields,
            ..ExtractionMetadata::default()
        };

        debug!(
            "Extracted NFS-e {} with confidence {:.2}",
            nfse.header.number.as_deref().unwrap_or(NOT_AVAILABLE),
            nfse.metadata.confidence
        );

        Ok(ExtractionResult {
            nfse,
            raw_text: text.to_string(),
            warnings,
            processing_time_ms,
        })
    }
}
