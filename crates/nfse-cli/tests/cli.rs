use std::path::Path;

use assert_cmd::Command;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use predicates::prelude::*;

fn write_text_pdf(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![40.into(), 780.into()]),
    ];
    for line in [
        "NOTA FISCAL DE SERVICOS ELETRONICA - NFS-e",
        "PREFEITURA MUNICIPAL DE CIDADE EXEMPLO",
        "Servicos de manutencao de equipamentos",
    ] {
        operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
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

/// Command isolated from the user's environment and `.env` files.
fn nf_extract(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nf-extract").unwrap();
    cmd.current_dir(dir)
        .env_remove("CLAUDE_API_KEY")
        .env_remove("NFSE_OCR_MODEL_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_unsupported_file_type() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("nota.txt"), "Número da NFS-e 29").unwrap();

    nf_extract(dir.path())
        .arg("nota.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    nf_extract(dir.path())
        .arg("missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn test_ai_extraction_rejected_for_pdf() {
    let dir = tempfile::tempdir().unwrap();
    write_text_pdf(&dir.path().join("nota.pdf"));

    nf_extract(dir.path())
        .args(["nota.pdf", "--ai-extraction"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported mode"));
}

#[test]
fn test_ai_parse_without_key() {
    let dir = tempfile::tempdir().unwrap();
    write_text_pdf(&dir.path().join("nota.pdf"));

    nf_extract(dir.path())
        .args(["nota.pdf", "--ai-parse", "--no-save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CLAUDE_API_KEY"));
}

#[test]
fn test_image_without_ocr_models() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbImage::new(20, 20).save(dir.path().join("nota.png")).unwrap();

    nf_extract(dir.path())
        .args(["nota.png", "--model-dir", "no-models"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OCR models not found"));
}

#[test]
fn test_dotenv_sets_model_dir() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbImage::new(20, 20).save(dir.path().join("nota.png")).unwrap();
    std::fs::write(dir.path().join(".env"), "NFSE_OCR_MODEL_DIR=modelos-env\n").unwrap();

    nf_extract(dir.path())
        .arg("nota.png")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OCR models not found in modelos-env"));
}

#[test]
fn test_text_pdf_saved_and_printed() {
    let dir = tempfile::tempdir().unwrap();
    write_text_pdf(&dir.path().join("nota.pdf"));

    nf_extract(dir.path())
        .args(["nota.pdf", "-o", "saida"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source_type\": \"text_pdf\""))
        .stderr(predicate::str::contains("Saved to"));

    let saved = dir.path().join("saida").join("nfse_N_A.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(saved).unwrap()).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["code"], 200);
    assert_eq!(json["data"]["nfse"]["metadata"]["extraction_mode"], "text_layer");
}

#[test]
fn test_no_save_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_text_pdf(&dir.path().join("nota.pdf"));

    nf_extract(dir.path())
        .args(["nota.pdf", "--no-save", "-f", "csv", "--validate"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("number,issued_at"))
        .stderr(predicate::str::contains("Missing NFS-e number"));

    assert!(!dir.path().join("nfse_N_A.json").exists());
}
