//! Regex patterns for NFSe field extraction.
//!
//! Patterns operate on cleaned text (single line, single spaces). Start
//! patterns locate a label; stop patterns mark where its value ends.

use lazy_static::lazy_static;
use regex::Regex;

// Header
lazy_static! {
    pub static ref ORIGIN_START: Regex = Regex::new(r"(?i)PREFEITURA\s+MUNICIPAL\s+DE\s*").unwrap();
    pub static ref ORIGIN_STOP: Regex = Regex::new(r"(?i)SECRETARIA|DIRETORIA|Número").unwrap();

    pub static ref AGENCY_START: Regex = Regex::new(r"(?i)SECRETARIA\s*MUNICIPAL\s+DE\s*").unwrap();
    pub static ref AGENCY_STOP: Regex = Regex::new(r"(?i)DIRETORIA|Número").unwrap();

    pub static ref NFSE_NUMBER: Regex = Regex::new(r"Número da NFS-?e\s*:?\s*(\d+)").unwrap();

    pub static ref ISSUED_AT_START: Regex = Regex::new(r"Data/Hora (?:de )?Emissão:?\s*").unwrap();
    pub static ref ISSUED_AT_STOP: Regex = Regex::new(r"Competência").unwrap();

    pub static ref COMPETENCE_START: Regex = Regex::new(r"Competência:?\s*").unwrap();
    pub static ref COMPETENCE_STOP: Regex = Regex::new(r"Código").unwrap();

    pub static ref VERIFICATION_START: Regex = Regex::new(r"Código de Verificação:?\s*").unwrap();
    pub static ref VERIFICATION_STOP: Regex = Regex::new(
        r"(?i)N[úu]mero do RPS|Nº NFS-?e|Local da Presta|Dados do Prestador"
    ).unwrap();

    pub static ref RPS_START: Regex = Regex::new(r"Número do RPS:?\s*").unwrap();
    pub static ref RPS_STOP: Regex = Regex::new(r"Nº NFS-?e Substituída").unwrap();

    pub static ref REPLACED_START: Regex = Regex::new(r"Nº NFS-?e Substituída:?\s*").unwrap();
    pub static ref REPLACED_STOP: Regex = Regex::new(r"Local da Prestação").unwrap();

    pub static ref LOCATION_START: Regex = Regex::new(r"Local da Prestação:?\s*").unwrap();
    pub static ref LOCATION_STOP: Regex = Regex::new(r"Dados do Prestador").unwrap();
}

// Sections
lazy_static! {
    pub static ref PROVIDER_SECTION: Regex = Regex::new(r"Dados do Prestador").unwrap();
    pub static ref TAKER_SECTION: Regex = Regex::new(r"Dados do Tomador").unwrap();
    pub static ref SERVICE_SECTION: Regex = Regex::new(r"Discriminação dos Serviços").unwrap();
    pub static ref FEDERAL_SECTION: Regex = Regex::new(r"Tributos Federais").unwrap();
    pub static ref VALUES_SECTION: Regex = Regex::new(r"Detalhamento de Valores").unwrap();
    pub static ref SERVICE_END: Regex = Regex::new(r"Tributos Federais|Detalhamento de Valores").unwrap();
}

// Company fields. A value ends at the next known label or at any
// capitalized word followed by a colon.
lazy_static! {
    pub static ref COMPANY_FIELD_STOP: Regex = Regex::new(
        r"(?:Nome Fantasia|Razão Social|Inscrição Municipal|Inscrição Estadual|Município|Endereço|Telefone|E-?mail|CNPJ|CPF)\s*:|\s\p{Lu}\p{L}*:"
    ).unwrap();

    pub static ref LEGAL_NAME: Regex = Regex::new(r"Razão Social:?\s*").unwrap();
    pub static ref TRADE_NAME: Regex = Regex::new(r"Nome Fantasia:?\s*").unwrap();
    pub static ref MUNICIPAL_REGISTRATION: Regex = Regex::new(r"Inscrição Municipal:?\s*").unwrap();
    pub static ref STATE_REGISTRATION: Regex = Regex::new(r"Inscrição Estadual:\s*(\S+)").unwrap();
    pub static ref PHONE: Regex = Regex::new(r"Telefone:?\s*").unwrap();
    pub static ref EMAIL_LABEL: Regex = Regex::new(r"(?i)E-?mail:?\s*").unwrap();
    pub static ref EMAIL: Regex = Regex::new(r"[\w.+-]+@(?:[\w-]+\.)+[\w-]{2,}").unwrap();
}

// Taxpayer IDs and address
lazy_static! {
    pub static ref CNPJ: Regex = Regex::new(r"\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}").unwrap();
    pub static ref CPF: Regex = Regex::new(r"\d{3}\.\d{3}\.\d{3}-\d{2}").unwrap();
    pub static ref BARE_DOCUMENT: Regex = Regex::new(r"(?:CNPJ|CPF)(?:/CPF)?:?\s*(\d{14}|\d{11})\b").unwrap();

    pub static ref CITY_STATE: Regex = Regex::new(r"Município:?\s*([^/]+?)\s*/\s*([A-Z]{2})\b").unwrap();
    pub static ref ADDRESS_START: Regex = Regex::new(r"Endereço:?\s*").unwrap();
    pub static ref ADDRESS_STOP: Regex = Regex::new(r"(?i)Telefone|E-?mail").unwrap();
    pub static ref STREET_NUMBER: Regex = Regex::new(r"^(.*?),?\s*(\d+)").unwrap();
    pub static ref DISTRICT: Regex = Regex::new(r"-\s*([^-]*?)\s*-").unwrap();
    pub static ref POSTAL_CODE: Regex = Regex::new(r"CEP:?\s*(\d{5}-\d{3}|\d{8})").unwrap();
}

// Service
lazy_static! {
    pub static ref DESCRIPTION_START: Regex = Regex::new(r"Discriminação dos Serviços\s*").unwrap();
    pub static ref DESCRIPTION_STOP: Regex = Regex::new(r"Código do Serviço|CNAE").unwrap();
    pub static ref SERVICE_CODE: Regex = Regex::new(r"Código do Serviço[^:]*:\s*([^-]+?)\s*-\s*").unwrap();
    pub static ref ACTIVITY_STOP: Regex = Regex::new(r"CNAE|Detalhamento").unwrap();
    pub static ref CNAE: Regex = Regex::new(r"CNAE:?\s*([^-]+?)\s*-\s*").unwrap();
    pub static ref CNAE_STOP: Regex = Regex::new(r"Detalhamento").unwrap();
    pub static ref NOTES: Regex = Regex::new(r"Detalhamento Específico.*").unwrap();
    pub static ref WORK_CODE: Regex = Regex::new(r"Código da Obra:?\s*(\S+)").unwrap();
    pub static ref ART_CODE: Regex = Regex::new(r"Código ART:?\s*(\S+)").unwrap();
}

// Federal taxes and values
lazy_static! {
    pub static ref PIS: Regex = Regex::new(r"PIS\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref COFINS: Regex = Regex::new(r"COFINS\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref IR: Regex = Regex::new(r"IR\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref INSS: Regex = Regex::new(r"INSS\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref CSLL: Regex = Regex::new(r"CSLL\s*R\$\s*([\d.,]+)").unwrap();

    pub static ref SERVICE_AMOUNT: Regex = Regex::new(r"Valor dos Serviços:?\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref DISCOUNT: Regex = Regex::new(r"Desconto:?\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref NET_AMOUNT: Regex = Regex::new(r"Valor Líquido:?\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref TAX_BASE: Regex = Regex::new(r"Base de Cálculo:?\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref ISS_RATE: Regex = Regex::new(r"Alíquota:?\s*([\d.,]+\s*%?)").unwrap();
    pub static ref ISS_AMOUNT: Regex = Regex::new(r"Valor (?:do )?ISS:?\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref OTHER_WITHHOLDINGS: Regex = Regex::new(r"Outras Retenções:?\s*R\$\s*([\d.,]+)").unwrap();
    pub static ref FEDERAL_WITHHOLDINGS: Regex = Regex::new(r"Retenções Federais:?\s*R\$\s*([\d.,]+)").unwrap();
}

// Generic value formats
lazy_static! {
    pub static ref DATETIME: Regex = Regex::new(r"(\d{2}/\d{2}/\d{4})(?:\s+(\d{2}:\d{2}))?").unwrap();
    pub static ref PERCENTAGE: Regex = Regex::new(r"(\d+(?:[,.]\d+)?)").unwrap();
    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}
