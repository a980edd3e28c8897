mod support;

use std::sync::Arc;

use zhex_auth::MemoryTokenStore;
use zhex_client::OnboardingError;
use zhex_client::onboarding::{
    Address, CompanyDetailsStep, DocumentKind, DocumentUpload, OnboardingSession, OnboardingStep,
    ProfileStep, RepresentativeInput,
};
use zhex_core::OnboardingToken;

use support::{MockApi, MockState};

async fn session(api: &MockApi, token: Option<&str>) -> OnboardingSession {
    let client = api.client(Arc::new(MemoryTokenStore::new()));
    let token = token.map(|t| OnboardingToken::new(t).unwrap());
    OnboardingSession::new(client, token)
}

fn profile() -> ProfileStep {
    ProfileStep {
        full_name: "Ana Souza".into(),
        email: "ana@acme.com.br".into(),
        phone: "11987654321".into(),
        cpf: "12345678901".into(),
    }
}

fn company() -> CompanyDetailsStep {
    CompanyDetailsStep {
        cnpj: "12345678000190".into(),
        legal_name: "Acme Comércio LTDA".into(),
        trade_name: "Acme".into(),
        website: None,
        address: Address {
            zip_code: "01310100".into(),
            street: "Av. Paulista".into(),
            number: "1000".into(),
            complement: None,
            neighborhood: "Bela Vista".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
        },
    }
}

fn document(file_name: &str) -> DocumentUpload {
    DocumentUpload {
        kind: DocumentKind::IdentityFront,
        file_name: file_name.into(),
        mime: "image/png".into(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

fn representative(cpf: &str, documents: Vec<DocumentUpload>) -> RepresentativeInput {
    RepresentativeInput {
        name: "Ana Souza".into(),
        cpf: cpf.into(),
        email: "ana@acme.com.br".into(),
        phone: "11987654321".into(),
        role: "partner".into(),
        documents,
    }
}

#[tokio::test]
async fn first_step_adopts_the_issued_token() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, None).await;

    session.submit(&profile()).await.unwrap();
    assert_eq!(session.token().map(OnboardingToken::as_str), Some("abc"));
    assert_eq!(session.current_step(), 1);
    assert_eq!(session.step(), Some(OnboardingStep::CompanyDetails));
    assert!(session.progress().profile);

    session.submit(&company()).await.unwrap();
    assert_eq!(session.current_step(), 2);
    assert!(session.progress().company_details);

    let hits = api.state.hits_for("/onboarding/step-2/company-details");
    assert_eq!(hits[0].query_token.as_deref(), Some("abc"));
    // Onboarding calls never carry the dashboard session.
    assert_eq!(hits[0].bearer, None);
}

#[tokio::test]
async fn later_steps_require_a_token() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, None).await;

    let err = session.submit(&company()).await.unwrap_err();
    assert!(matches!(err, OnboardingError::MissingToken));
    assert!(api.state.hits().is_empty());
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_sending() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, None).await;

    let mut bad = profile();
    bad.cpf = "123".into();
    let err = session.submit(&bad).await.unwrap_err();

    let OnboardingError::Api(api_err) = err else {
        panic!("expected a validation error");
    };
    assert!(api_err.field_errors().unwrap().get("cpf").is_some());
    assert!(api.state.hits().is_empty());
}

#[tokio::test]
async fn resume_loads_progress_from_the_link_token() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, Some("abc")).await;

    session.resume().await.unwrap();
    assert_eq!(session.current_step(), 3);
    assert_eq!(session.step(), Some(OnboardingStep::BankAccount));
    assert!(session.progress().representatives);
    assert!(!session.is_complete());
}

#[tokio::test]
async fn unknown_link_token_fails_to_resume() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, Some("stale")).await;

    let err = session.resume().await.unwrap_err();
    assert!(matches!(err, OnboardingError::Api(_)));
    assert_eq!(session.current_step(), 0);
    assert_eq!(api.state.refresh_calls(), 0);
}

#[tokio::test]
async fn link_token_is_replaced_by_the_issued_one() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, Some("from-link")).await;

    session.submit(&profile()).await.unwrap();
    assert_eq!(session.token().map(OnboardingToken::as_str), Some("abc"));
    assert_eq!(
        api.state.hits_for("/onboarding/step-1/profile")[0].query_token.as_deref(),
        Some("from-link")
    );
}

#[tokio::test]
async fn representatives_and_documents_are_submitted() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    let mut session = session(&api, Some("abc")).await;

    let outcome = session
        .submit_representatives(vec![
            representative("12345678901", vec![document("front.png"), document("back.png")]),
            representative("10987654321", vec![document("id.png")]),
        ])
        .await
        .unwrap();

    let reps: Vec<_> = outcome.representatives.iter().map(|id| id.as_str()).collect();
    assert_eq!(reps, vec!["r1", "r2"]);
    let docs: Vec<_> = outcome.documents.iter().map(|id| id.as_str()).collect();
    assert_eq!(docs, vec!["r1-front.png", "r1-back.png", "r2-id.png"]);
    assert_eq!(session.current_step(), 3);
}

#[tokio::test]
async fn failed_upload_reports_what_was_saved() {
    let api = MockApi::spawn(MockState::new("T1")).await;
    *api.state.failing_document.lock().unwrap() = Some("back.png".into());
    let mut session = session(&api, Some("abc")).await;

    let err = session
        .submit_representatives(vec![
            representative("12345678901", vec![document("front.png"), document("back.png")]),
            representative("10987654321", vec![document("id.png")]),
        ])
        .await
        .unwrap_err();

    let OnboardingError::PartialRepresentatives {
        created,
        uploaded,
        failed_representative,
        file_name,
        ..
    } = err
    else {
        panic!("expected a partial failure");
    };
    assert_eq!(created.len(), 2);
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].as_str(), "r1-front.png");
    assert_eq!(failed_representative.as_str(), "r1");
    assert_eq!(file_name, "back.png");
    // The second representative's documents were never attempted.
    assert!(api.state.hits_for("/onboarding/step-3/representatives/r2/documents").is_empty());
}
