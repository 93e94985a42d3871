//! NFSe (Nota Fiscal de Serviço Eletrônica) data models.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::parser::documents::validate_document;

/// Placeholder used for mandatory text fields that could not be found.
pub const NOT_AVAILABLE: &str = "N/A";

/// A complete service invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nfse {
    /// Header (number, dates, codes, issuing authority).
    pub header: NfseHeader,

    /// Service provider (prestador).
    pub provider: Company,

    /// Service taker (tomador).
    pub taker: Company,

    /// Service description and classification.
    pub service: ServiceDetail,

    /// Amounts and municipal tax (ISS).
    pub values: Values,

    /// Federal taxes withheld.
    #[serde(default)]
    pub federal_taxes: FederalTaxes,

    /// Extraction metadata.
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

/// Invoice header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NfseHeader {
    /// NFS-e number.
    pub number: Option<String>,

    /// Date and time of issue.
    pub issued_at: Option<NaiveDateTime>,

    /// Reference period (competência), usually `MM/YYYY`.
    pub competence: Option<String>,

    /// Verification code printed on the document.
    pub verification_code: String,

    /// RPS (provisional receipt) number.
    pub rps_number: String,

    /// Where the service was rendered.
    pub service_location: String,

    /// Issuing city hall.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Issuing municipal agency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,

    /// Number of the NFS-e replaced by this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_nfse: Option<String>,
}

impl Default for NfseHeader {
    fn default() -> Self {
        Self {
            number: None,
            issued_at: None,
            competence: None,
            verification_code: NOT_AVAILABLE.to_string(),
            rps_number: NOT_AVAILABLE.to_string(),
            service_location: NOT_AVAILABLE.to_string(),
            origin: None,
            agency: None,
            replaced_nfse: None,
        }
    }
}

/// A company on the invoice (provider or taker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Registered legal name (razão social).
    pub legal_name: String,

    /// CNPJ, or CPF for individuals.
    pub cnpj: String,

    /// Municipal registration (inscrição municipal).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipal_registration: Option<String>,

    /// State registration (inscrição estadual).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_registration: Option<String>,

    /// Trade name (nome fantasia).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,

    /// Postal address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    /// Phone and email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

impl Company {
    /// A company whose section was missing from the document.
    pub fn unknown() -> Self {
        Self {
            legal_name: NOT_AVAILABLE.to_string(),
            cnpj: NOT_AVAILABLE.to_string(),
            municipal_registration: None,
            state_registration: None,
            trade_name: None,
            address: None,
            contact: None,
        }
    }

    /// Whether this company carries real data.
    pub fn is_known(&self) -> bool {
        self.legal_name != NOT_AVAILABLE || self.cnpj != NOT_AVAILABLE
    }
}

impl Default for Company {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Brazilian postal address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Street (logradouro).
    pub street: String,

    /// Street number.
    pub number: String,

    /// District (bairro).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    /// CEP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    /// City (município).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// Two-letter state code (UF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Address {
    /// Check if the address has any data.
    pub fn is_empty(&self) -> bool {
        self.street.is_empty()
            && self.number.is_empty()
            && self.district.is_none()
            && self.postal_code.is_none()
            && self.city.is_none()
    }

    /// Format as a single line, e.g. `RUA DEMO, 100 - CENTRO - CEP: 00000-000 - CIDADE/XX`.
    pub fn format(&self) -> String {
        let mut parts = vec![format!("{}, {}", self.street, self.number)];
        if let Some(district) = &self.district {
            parts.push(format!("- {}", district));
        }
        if let Some(cep) = &self.postal_code {
            parts.push(format!("- CEP: {}", cep));
        }
        if let (Some(city), Some(state)) = (&self.city, &self.state) {
            parts.push(format!("- {}/{}", city, state));
        }
        parts.join(" ")
    }
}

/// Contact information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Contact {
    /// Build a contact only when at least one field is present.
    pub fn from_parts(phone: Option<String>, email: Option<String>) -> Option<Self> {
        if phone.is_none() && email.is_none() {
            None
        } else {
            Some(Self { phone, email })
        }
    }
}

/// Details of the service rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    /// Free-text service description (discriminação).
    pub description: String,

    /// Municipal service code, e.g. `14.01`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,

    /// Activity described by the service code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_description: Option<String>,

    /// CNAE economic activity code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnae: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnae_description: Option<String>,

    /// Service-specific remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Civil construction details, when the service is construction work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction: Option<CivilConstruction>,
}

impl Default for ServiceDetail {
    fn default() -> Self {
        Self {
            description: NOT_AVAILABLE.to_string(),
            service_code: None,
            activity_description: None,
            cnae: None,
            cnae_description: None,
            notes: None,
            construction: None,
        }
    }
}

/// Civil construction identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CivilConstruction {
    /// Work code (código da obra).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_code: Option<String>,

    /// Technical responsibility annotation (ART).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_code: Option<String>,
}

/// Monetary values of the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Values {
    /// Gross value of the services.
    pub service_amount: Decimal,

    pub discount: Decimal,

    /// Net value (services minus discount).
    pub net_amount: Decimal,

    /// ISS calculation base.
    pub tax_base: Decimal,

    /// ISS rate as a fraction (2% is `0.02`).
    pub iss_rate: Decimal,

    pub iss_amount: Decimal,

    pub other_withholdings: Decimal,

    pub federal_withholdings: Decimal,
}

impl Default for Values {
    fn default() -> Self {
        Self {
            service_amount: zero(),
            discount: zero(),
            net_amount: zero(),
            tax_base: zero(),
            iss_rate: zero(),
            iss_amount: zero(),
            other_withholdings: zero(),
            federal_withholdings: zero(),
        }
    }
}

/// Federal taxes (PIS, COFINS, IR, INSS, CSLL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederalTaxes {
    pub pis: Decimal,
    pub cofins: Decimal,
    pub ir: Decimal,
    pub inss: Decimal,
    pub csll: Decimal,
}

impl Default for FederalTaxes {
    fn default() -> Self {
        Self {
            pis: zero(),
            cofins: zero(),
            ir: zero(),
            inss: zero(),
            csll: zero(),
        }
    }
}

impl FederalTaxes {
    /// Sum of all federal taxes.
    pub fn total(&self) -> Decimal {
        self.pis + self.cofins + self.ir + self.inss + self.csll
    }
}

/// `0.00` with two decimal places, so defaults serialize like parsed amounts.
pub fn zero() -> Decimal {
    Decimal::new(0, 2)
}

/// Metadata about the extraction process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Source document type.
    pub source_type: SourceType,

    /// How the text (or data) was obtained.
    pub extraction_mode: ExtractionMode,

    /// How the text was turned into fields.
    pub parse_mode: ParseMode,

    /// Overall extraction confidence (0.0 - 1.0).
    pub confidence: f32,

    /// Processing time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    /// OCR engine used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_engine: Option<String>,

    /// AI model used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,

    /// Warnings or issues encountered during extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Fields that could not be extracted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl Default for ExtractionMetadata {
    fn default() -> Self {
        Self {
            source_type: SourceType::Unknown,
            extraction_mode: ExtractionMode::TextLayer,
            parse_mode: ParseMode::Rules,
            confidence: 0.0,
            processing_time_ms: None,
            ocr_engine: None,
            ai_model: None,
            warnings: Vec::new(),
            missing_fields: Vec::new(),
        }
    }
}

/// Source document type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// PDF with an embedded text layer.
    TextPdf,
    /// PDF without usable text, read through OCR of its images.
    ScannedPdf,
    /// Direct image file.
    Image,
    #[default]
    Unknown,
}

/// How raw content was obtained from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Embedded PDF text layer.
    TextLayer,
    /// Local OCR engine.
    Ocr,
    /// AI vision model reading the image directly.
    AiVision,
}

/// How text was mapped to fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Deterministic label/regex rules.
    Rules,
    /// AI text completion.
    Ai,
}

impl Nfse {
    /// Create an empty NFSe with placeholder values.
    pub fn new() -> Self {
        Self {
            header: NfseHeader::default(),
            provider: Company::unknown(),
            taker: Company::unknown(),
            service: ServiceDetail::default(),
            values: Values::default(),
            federal_taxes: FederalTaxes::default(),
            metadata: ExtractionMetadata::default(),
        }
    }

    /// Identifier used to name output files.
    pub fn identifier(&self) -> &str {
        &self.header.verification_code
    }

    /// Validate the NFSe data and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.consistency_issues();
        issues.extend(self.document_issues());
        issues
    }

    /// CNPJ/CPF check digit issues for the provider and taker.
    pub fn document_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.provider.is_known() && !validate_document(&self.provider.cnpj) {
            issues.push(format!("Provider CNPJ/CPF has invalid check digits: {}", self.provider.cnpj));
        }

        if self.taker.is_known() && !validate_document(&self.taker.cnpj) {
            issues.push(format!("Taker CNPJ/CPF has invalid check digits: {}", self.taker.cnpj));
        }

        issues
    }

    /// Missing identification and arithmetic mismatches between amounts.
    pub fn consistency_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let tolerance = Decimal::new(1, 2);

        if self.header.number.is_none() {
            issues.push("Missing NFS-e number".to_string());
        }

        if !self.provider.is_known() {
            issues.push("Missing provider information".to_string());
        }

        if self.values.service_amount.is_zero() {
            issues.push("Service amount is zero".to_string());
        }

        let expected_net = self.values.service_amount - self.values.discount;
        if !self.values.net_amount.is_zero() && (expected_net - self.values.net_amount).abs() > tolerance {
            issues.push(format!(
                "Net amount ({}) differs from services minus discount ({})",
                self.values.net_amount, expected_net
            ));
        }

        let expected_iss = (self.values.tax_base * self.values.iss_rate).round_dp(2);
        if !self.values.iss_amount.is_zero() && (expected_iss - self.values.iss_amount).abs() > tolerance {
            issues.push(format!(
                "ISS amount ({}) differs from base times rate ({})",
                self.values.iss_amount, expected_iss
            ));
        }

        issues
    }
}

impl Default for Nfse {
    fn default() -> Self {
        Self::new()
    }
}
