//! Prompts for NFSe extraction with a hosted model.

/// System prompt describing the expected JSON document.
pub const STRUCTURED_DATA_SYSTEM: &str = r#"You extract data from Brazilian service invoices (NFS-e, Nota Fiscal de Serviço Eletrônica).
Convert the invoice you are given into a JSON document with exactly the structure below.

Rules:
1. Read every field carefully, even when fields appear in an unusual order.
2. Use null for anything you cannot find.
3. Monetary values are plain decimal numbers without currency symbols or thousands separators (R$ 1.500,00 becomes 1500.00).
4. iss_rate is a fraction between 0 and 1 (2% becomes 0.02).
5. issued_at uses ISO 8601 (YYYY-MM-DDTHH:MM:SS) when possible.
6. Keep CNPJ/CPF exactly as printed.
7. service.notes holds service-specific remarks printed after the service code, activity and CNAE, not remarks about the document itself.
8. Answer with the JSON only, without explanations or markdown.

{
  "header": {
    "number": "string or null",
    "issued_at": "ISO datetime or null",
    "competence": "MM/YYYY or null",
    "verification_code": "string or null",
    "rps_number": "string or null",
    "service_location": "string or null",
    "origin": "issuing city hall or null",
    "agency": "issuing municipal agency or null",
    "replaced_nfse": "string or null"
  },
  "provider": {
    "legal_name": "string",
    "cnpj": "string",
    "municipal_registration": "string or null",
    "state_registration": "string or null",
    "trade_name": "string or null",
    "address": {
      "street": "string",
      "number": "string",
      "district": "string or null",
      "postal_code": "string or null",
      "city": "string or null",
      "state": "two-letter UF or null"
    },
    "contact": { "phone": "string or null", "email": "string or null" }
  },
  "taker": { "same fields as provider": "..." },
  "service": {
    "description": "string",
    "service_code": "string or null",
    "activity_description": "string or null",
    "cnae": "string or null",
    "cnae_description": "string or null",
    "notes": "string or null",
    "construction": { "work_code": "string or null", "art_code": "string or null" }
  },
  "values": {
    "service_amount": 0.0,
    "discount": 0.0,
    "net_amount": 0.0,
    "tax_base": 0.0,
    "iss_rate": 0.0,
    "iss_amount": 0.0,
    "other_withholdings": 0.0,
    "federal_withholdings": 0.0
  },
  "federal_taxes": { "pis": 0.0, "cofins": 0.0, "ir": 0.0, "inss": 0.0, "csll": 0.0 }
}"#;

/// User instruction preceding invoice text.
pub const STRUCTURED_TEXT_USER: &str =
    "Extract the data of this NFS-e and return it as JSON:";

/// User instruction accompanying an invoice image.
pub const STRUCTURED_IMAGE_USER: &str =
    "Read this NFS-e image and extract its data following the requested JSON structure.";

/// User message for text parsing.
pub fn text_message(text: &str) -> String {
    format!("{}\n\n{}", STRUCTURED_TEXT_USER, text)
}
