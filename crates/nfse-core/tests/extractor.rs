//! End-to-end tests of the file-level extractor with fake OCR and AI backends.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use nfse_core::ai::{CompletionRequest, ContentBlock, LanguageModel};
use nfse_core::error::{AiError, ExtractionError, NfseError, OcrError};
use nfse_core::models::config::NfseConfig;
use nfse_core::{
    ExtractionMode, ExtractionOptions, FileType, NfExtractor, OcrEngine, OcrResult, ParseMode,
    SourceType, TextBox, output,
};

const NFSE_TEXT: &str = "PREFEITURA MUNICIPAL DE CIDADE EXEMPLO
Número da NFS-e 29
Data/Hora Emissão: 01/01/2025 09:00 Competência: 01/2025 Código de Verificação: XYZ123 Número do RPS: 000045 Nº NFSe Substituída: ---
Local da Prestação: CIDADE EXEMPLO
Dados do Prestador de Serviços
Razão Social: EMPRESA FICTÍCIA LTDA
CNPJ: 11.222.333/0001-81 Inscrição Municipal: 123456
Município: CIDADE EXEMPLO / XX Endereço: RUA DEMO, 100 - CENTRO - CEP: 00000-000
Dados do Tomador de Serviços
Razão Social: CLIENTE TESTE S.A.
CPF: 529.982.247-25
Discriminação dos Serviços
Manutenção de equipamentos.
Código do Serviço - Atividade: 14.01 - Manutenção de equipamentos
Tributos Federais PIS R$ 0,00 COFINS R$ 0,00 IR R$ 0,00 INSS R$ 0,00 CSLL R$ 0,00
Detalhamento de Valores - Prestador dos Serviços
Valor dos Serviços: R$ 1.500,00 (-) Desconto: R$ 0,00 (=) Valor Líquido: R$ 1.500,00
Base de Cálculo: R$ 1.500,00 Alíquota: 2% (=) Valor ISS: R$ 30,00
Outras Retenções: R$ 0,00 Retenções Federais: R$ 0,00";

const MODEL_JSON: &str = r#"```json
{
  "header": {"number": "77", "verification_code": "AI-CODE"},
  "provider": {"legal_name": "EMPRESA VISTA LTDA", "cnpj": "11.222.333/0001-81"},
  "taker": {"legal_name": "TOMADOR", "cnpj": "529.982.247-25"},
  "service": {"description": "Consultoria"},
  "values": {"service_amount": "200,00", "net_amount": 200, "tax_base": 200, "iss_rate": 5, "iss_amount": 10}
}
```"#;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// OCR engine returning fixed text and recording what it was given.
struct FakeOcr {
    text: String,
    seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl FakeOcr {
    fn new(text: &str) -> (Box<Self>, Arc<Mutex<Vec<(u32, u32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = Box::new(Self {
            text: text.to_string(),
            seen: Arc::clone(&seen),
        });
        (engine, seen)
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        self.seen.lock().unwrap().push(image.dimensions());
        let boxes = self
            .text
            .lines()
            .enumerate()
            .map(|(i, line)| {
                let y = i as f32 * 30.0;
                TextBox {
                    bbox: [0.0, y, 500.0, y, 500.0, y + 20.0, 0.0, y + 20.0],
                    text: line.to_string(),
                    confidence: 0.95,
                }
            })
            .collect();
        Ok(OcrResult::from_boxes(boxes, image.dimensions(), 1))
    }

    fn name(&self) -> &str {
        "fake-ocr"
    }
}

/// Language model answering every request with the same text.
struct FakeModel {
    answer: String,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl FakeModel {
    fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// Single-page PDF with ASCII text lines and/or a gray image.
fn write_pdf(path: &Path, lines: &[&str], gray_image: Option<(u32, u32)>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut xobjects = lopdf::Dictionary::new();
    let mut operations = Vec::new();

    if !lines.is_empty() {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![40.into(), 780.into()]),
        ]);
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
    }

    if let Some((w, h)) = gray_image {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![220u8; (w * h) as usize],
        ));
        xobjects.set("Im1", image_id);
        operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![(w as i64).into(), 0.into(), 0.into(), (h as i64).into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ]);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => xobjects,
    });

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).unwrap();
}

fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([250, 250, 250]))
        .save(path)
        .unwrap();
}

const PDF_LINES: &[&str] = &[
    "NOTA FISCAL DE SERVICOS ELETRONICA - NFS-e",
    "PREFEITURA MUNICIPAL DE CIDADE EXEMPLO",
    "CNPJ: 11.222.333/0001-81",
    "Servicos de manutencao de equipamentos",
];

fn text_pdf(dir: &Path) -> PathBuf {
    let path = dir.join("nota.pdf");
    write_pdf(&path, PDF_LINES, None);
    path
}

#[test]
fn test_pdf_text_layer_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let path = text_pdf(dir.path());

    let extractor = NfExtractor::new(&path, ExtractionOptions::default(), NfseConfig::default()).unwrap();
    let text = extractor.extract_text().unwrap();

    for line in PDF_LINES {
        assert!(text.contains(line), "missing {line:?} in {text:?}");
    }
}

#[tokio::test]
async fn test_pdf_rules_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = text_pdf(dir.path());

    let extractor = NfExtractor::new(&path, ExtractionOptions::default(), NfseConfig::default()).unwrap();
    let nfse = extractor.extract().await.unwrap();

    assert_eq!(nfse.metadata.source_type, SourceType::TextPdf);
    assert_eq!(nfse.metadata.extraction_mode, ExtractionMode::TextLayer);
    assert_eq!(nfse.metadata.parse_mode, ParseMode::Rules);
    assert_eq!(nfse.metadata.ocr_engine, None);
    assert!(nfse.metadata.processing_time_ms.is_some());
    assert!(nfse.metadata.confidence < 1.0);
    assert!(nfse.metadata.missing_fields.contains(&"header.number".to_string()));
}

#[tokio::test]
async fn test_scanned_pdf_falls_back_to_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    write_pdf(&path, &[], Some((40, 30)));

    let (engine, seen) = FakeOcr::new(NFSE_TEXT);
    let extractor = NfExtractor::new(&path, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);

    let nfse = extractor.extract().await.unwrap();

    assert_eq!(nfse.metadata.source_type, SourceType::ScannedPdf);
    assert_eq!(nfse.metadata.extraction_mode, ExtractionMode::Ocr);
    assert_eq!(nfse.metadata.ocr_engine.as_deref(), Some("fake-ocr"));
    assert_eq!(nfse.header.number.as_deref(), Some("29"));
    // Narrow page image is upscaled before recognition.
    assert_eq!(seen.lock().unwrap().as_slice(), &[(1500, 1125)]);
}

#[tokio::test]
async fn test_scanned_pdf_keeps_text_layer_when_ocr_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    write_pdf(&path, &["RECIBO 5"], Some((40, 30)));

    let mut config = NfseConfig::default();
    config.ocr.model_dir = dir.path().join("models");

    let extractor = NfExtractor::new(&path, ExtractionOptions::default(), config).unwrap();
    let nfse = extractor.extract().await.unwrap();

    assert_eq!(nfse.metadata.source_type, SourceType::TextPdf);
    assert_eq!(nfse.metadata.extraction_mode, ExtractionMode::TextLayer);
    assert_eq!(nfse.metadata.ocr_engine, None);
    assert!(extractor.extract_text().unwrap().contains("RECIBO 5"));
}

#[tokio::test]
async fn test_image_through_ocr_and_rules() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nota.png");
    write_png(&path, 1200, 800);

    let (engine, seen) = FakeOcr::new(NFSE_TEXT);
    let extractor = NfExtractor::new(&path, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);
    assert_eq!(extractor.file_type(), FileType::Image);

    let text = extractor.extract_text().unwrap();
    assert!(!text.trim().is_empty());
    assert!(text.starts_with("PREFEITURA MUNICIPAL"));

    let nfse = extractor.extract().await.unwrap();

    assert_eq!(seen.lock().unwrap().as_slice(), &[(1200, 800), (1200, 800)]);
    assert_eq!(nfse.metadata.source_type, SourceType::Image);
    assert_eq!(nfse.metadata.extraction_mode, ExtractionMode::Ocr);
    assert_eq!(nfse.header.number.as_deref(), Some("29"));
    assert_eq!(nfse.header.verification_code, "XYZ123");
    assert_eq!(nfse.provider.legal_name, "EMPRESA FICTÍCIA LTDA");
    assert_eq!(nfse.provider.cnpj, "11.222.333/0001-81");
    assert_eq!(nfse.taker.legal_name, "CLIENTE TESTE S.A.");
    assert_eq!(nfse.taker.cnpj, "529.982.247-25");
    assert_eq!(nfse.values.service_amount, dec("1500.00"));
    assert_eq!(nfse.values.iss_rate, dec("0.02"));
    assert_eq!(nfse.values.iss_amount, dec("30.00"));
    assert!(nfse.metadata.warnings.is_empty(), "{:?}", nfse.metadata.warnings);
}

#[tokio::test]
async fn test_image_with_ai_vision() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foto.png");
    write_png(&path, 10, 10);

    let model = FakeModel::new(MODEL_JSON);
    let options = ExtractionOptions {
        ai_extraction: true,
        ai_parse: true,
    };
    let extractor = NfExtractor::new(&path, options, NfseConfig::default())
        .unwrap()
        .with_language_model(model.clone());

    let nfse = extractor.extract().await.unwrap();

    assert_eq!(nfse.header.number.as_deref(), Some("77"));
    assert_eq!(nfse.values.service_amount, dec("200.00"));
    assert_eq!(nfse.values.iss_rate, dec("0.05"));
    assert_eq!(nfse.metadata.source_type, SourceType::Image);
    assert_eq!(nfse.metadata.extraction_mode, ExtractionMode::AiVision);
    assert_eq!(nfse.metadata.parse_mode, ParseMode::Ai);
    assert_eq!(nfse.metadata.ai_model.as_deref(), Some("fake-model"));

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    match &seen[0].content[0] {
        ContentBlock::Image { media_type, data } => {
            assert_eq!(media_type, "image/png");
            assert!(!data.is_empty());
        }
        other => panic!("expected image block, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pdf_with_ai_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = text_pdf(dir.path());

    let model = FakeModel::new(MODEL_JSON);
    let options = ExtractionOptions {
        ai_extraction: false,
        ai_parse: true,
    };
    let extractor = NfExtractor::new(&path, options, NfseConfig::default())
        .unwrap()
        .with_language_model(model.clone());

    let nfse = extractor.extract().await.unwrap();

    assert_eq!(nfse.header.verification_code, "AI-CODE");
    assert_eq!(nfse.metadata.source_type, SourceType::TextPdf);
    assert_eq!(nfse.metadata.extraction_mode, ExtractionMode::TextLayer);
    assert_eq!(nfse.metadata.parse_mode, ParseMode::Ai);

    let seen = model.seen.lock().unwrap();
    assert!(matches!(&seen[0].content[0], ContentBlock::Text(t) if t.contains("PREFEITURA MUNICIPAL")));
}

#[tokio::test]
async fn test_extract_and_save_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nota.png");
    write_png(&input, 1200, 800);
    let out_dir = dir.path().join("saida");

    let (engine, _) = FakeOcr::new(NFSE_TEXT);
    let extractor = NfExtractor::new(&input, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);

    let saved = extractor.extract_and_save(Some(&out_dir)).await.unwrap();
    assert_eq!(saved, out_dir.join("nfse_XYZ123.json"));

    let mut loaded = output::load_json(&saved).unwrap();
    let mut fresh = extractor.extract().await.unwrap();
    loaded.metadata.processing_time_ms = None;
    fresh.metadata.processing_time_ms = None;
    assert_eq!(loaded, fresh);
}

#[tokio::test]
async fn test_save_next_to_input_without_verification_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nota.png");
    write_png(&input, 1200, 800);

    let (engine, _) = FakeOcr::new("Número da NFS-e 5");
    let extractor = NfExtractor::new(&input, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);

    let saved = extractor.extract_and_save(None).await.unwrap();
    assert_eq!(saved, dir.path().join("nfse_N_A.json"));
    assert!(saved.is_file());
}

#[tokio::test]
async fn test_save_when_ocr_garbles_rps_label() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nota.png");
    write_png(&input, 1200, 800);

    let text = NFSE_TEXT.replace("Número do RPS", "Numero do RPS");
    let (engine, _) = FakeOcr::new(&text);
    let extractor = NfExtractor::new(&input, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);

    let saved = extractor.extract_and_save(None).await.unwrap();
    assert_eq!(saved, dir.path().join("nfse_XYZ123.json"));
    assert_eq!(output::load_json(&saved).unwrap().header.verification_code, "XYZ123");
}

#[tokio::test]
async fn test_save_with_unterminated_verification_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nota.png");
    write_png(&input, 1200, 800);

    let code = "A".repeat(300);
    let (engine, _) = FakeOcr::new(&format!("Número da NFS-e 5\nCódigo de Verificação: {code}"));
    let extractor = NfExtractor::new(&input, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);

    let saved = extractor.extract_and_save(None).await.unwrap();
    assert!(saved.is_file());
    assert_eq!(
        saved.file_name().unwrap().len(),
        "nfse_".len() + output::MAX_IDENTIFIER_LEN + ".json".len()
    );
}

#[tokio::test]
async fn test_blank_ocr_text_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("branco.png");
    write_png(&input, 1200, 800);

    let (engine, _) = FakeOcr::new("");
    let extractor = NfExtractor::new(&input, ExtractionOptions::default(), NfseConfig::default())
        .unwrap()
        .with_ocr_engine(engine);

    let err = extractor.extract().await.unwrap_err();
    assert!(matches!(err, NfseError::Extraction(ExtractionError::NoData)));
}

#[tokio::test]
async fn test_missing_ocr_models() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nota.png");
    write_png(&input, 100, 100);

    let mut config = NfseConfig::default();
    config.ocr.model_dir = dir.path().join("models");

    let extractor = NfExtractor::new(&input, ExtractionOptions::default(), config).unwrap();
    let err = extractor.extract().await.unwrap_err();
    assert!(matches!(err, NfseError::Ocr(OcrError::ModelsNotFound(_))), "{err}");
}

#[tokio::test]
async fn test_missing_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = text_pdf(dir.path());

    let options = ExtractionOptions {
        ai_extraction: false,
        ai_parse: true,
    };
    let extractor = NfExtractor::new(&path, options, NfseConfig::default()).unwrap();
    let err = extractor.extract().await.unwrap_err();
    assert!(matches!(err, NfseError::Ai(AiError::MissingApiKey)));
}
