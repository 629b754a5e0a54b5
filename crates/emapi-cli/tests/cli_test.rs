//! Integration tests for the emapi command reader

#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn emapi(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("emapi").unwrap();
    cmd.arg("--config").arg(config).env_remove("EMAPI_ENDPOINT");
    cmd
}

fn soap_ok(inner: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/xml; charset=utf-8")
        .set_body_string(format!(
            r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{}</soap:Body></soap:Envelope>"#,
            inner
        ))
}

#[test]
fn test_help_command() {
    let dir = tempfile::tempdir().unwrap();
    emapi(&dir.path().join("emapi.toml"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Email Manager"))
        .stdout(predicate::str::contains("--log-level"));
}

#[test]
fn test_exit_ends_session_and_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("emapi.toml");

    emapi(&config).write_stdin("exit\n").assert().success();

    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("endpoint = "));
    assert!(written.contains("[export]"));
}

#[test]
fn test_commands_before_login() {
    let dir = tempfile::tempdir().unwrap();
    emapi(&dir.path().join("emapi.toml"))
        .write_stdin("exportresponse\nlistcreate\nfoo\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Please log in first"))
        .stdout(predicate::str::contains("'listcreate' is not supported"))
        .stdout(predicate::str::contains("Unknown command 'foo'"));
}

#[test]
fn test_end_of_input_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    emapi(&dir.path().join("emapi.toml"))
        .write_stdin("")
        .assert()
        .success();
}

#[tokio::test]
async fn test_login_and_import() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authenticate.asmx"))
        .and(body_string_contains("<id>bad</id>"))
        .respond_with(soap_ok(
            "<AuthenticateResponse><AuthenticateResult>DMLR_LOGININVALID</AuthenticateResult></AuthenticateResponse>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/authenticate.asmx"))
        .and(body_string_contains("<id>user</id>"))
        .respond_with(soap_ok(
            "<AuthenticateResponse><AuthenticateResult>DMLR_SUCCESS</AuthenticateResult><token>tok-1</token></AuthenticateResponse>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ListImport.asmx"))
        .and(body_string_contains("CreateImport"))
        .and(body_string_contains("<token>tok-1</token>"))
        .respond_with(soap_ok(
            "<CreateImportResponse><CreateImportResult>5</CreateImportResult></CreateImportResponse>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ListImport.asmx"))
        .and(body_string_contains("ImportDataS"))
        .and(body_string_contains("john@example.com"))
        .respond_with(soap_ok("<ImportDataSResponse/>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ListImport.asmx"))
        .and(body_string_contains("FinishImport"))
        .respond_with(soap_ok("<FinishImportResponse/>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ListImport.asmx"))
        .and(body_string_contains("GetImportStatus"))
        .respond_with(soap_ok(
            "<GetImportStatusResponse><GetImportStatusResult>Completed</GetImportStatusResult></GetImportStatusResponse>",
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    emapi(&dir.path().join("emapi.toml"))
        .arg("--endpoint")
        .arg(server.uri())
        .write_stdin("login bad pw\nlogin user pw\nsend_multipleemails_withdeployment\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid id or password"))
        .stdout(predicate::str::contains("Login successful."))
        .stdout(predicate::str::contains("Success"));
}

#[tokio::test]
async fn test_export_writes_output_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authenticate.asmx"))
        .respond_with(soap_ok(
            "<AuthenticateResponse><AuthenticateResult>DMLR_SUCCESS</AuthenticateResult><token>tok-2</token></AuthenticateResponse>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/DMPlus.svc"))
        .and(body_string_contains("CreateExportByDate"))
        .respond_with(soap_ok(
            "<CreateExportByDateResponse><CreateExportByDateResult><ExportID>E1</ExportID><ApproximateCount>1</ApproximateCount></CreateExportByDateResult></CreateExportByDateResponse>",
        ))
        .mount(&server)
        .await;
    // gzip of "event,1\n", base64 encoded
    Mock::given(method("POST"))
        .and(path("/DMPlus.svc"))
        .and(body_string_contains("<pageNumber>1</pageNumber>"))
        .respond_with(soap_ok(
            "<ExportEventlogDataByPageResponse><ExportEventlogDataByPageResult>H4sIAAAAAAAC/0stS80r0THkAgCBpSj/CAAAAA==</ExportEventlogDataByPageResult></ExportEventlogDataByPageResponse>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/DMPlus.svc"))
        .and(body_string_contains("<pageNumber>2</pageNumber>"))
        .respond_with(soap_ok(
            "<ExportEventlogDataByPageResponse><ExportEventlogDataByPageResult/></ExportEventlogDataByPageResponse>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/DMPlus.svc"))
        .and(body_string_contains("DeleteExport"))
        .respond_with(soap_ok("<DeleteExportResponse/>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("emapi.toml");
    let output = dir.path().join("Export.csv");
    std::fs::write(
        &config,
        format!(
            "endpoint = \"{}\"\n\n[export]\noutput_file = {:?}\n",
            server.uri(),
            output.display().to_string()
        ),
    )
    .unwrap();

    emapi(&config)
        .write_stdin("login user pw\nexportresponse\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Success"));

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "event,1\n");
}
