//! Company onboarding wizard.
//!
//! The server is the single source of truth for progression. The session only
//! caches the continuation token, the current (0-based) step and the
//! `completedSteps` flags, and updates all three from every response:
//!
//! - a non-empty `onboardingToken` in a response replaces the held token;
//! - `nextStep.step` (1-based) becomes `current_step = step - 1`.
//!
//! Step order is not enforced locally; the API rejects out-of-order
//! submissions. Failures are surfaced once, without retries.

pub mod steps;

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use zhex_core::{DocumentId, OnboardingToken, RepresentativeId, Validate};

use crate::error::{ApiError, ErrorKind};
use crate::gateway::{ApiClient, ApiRequest, Upload};

pub use steps::{
    AccountType, Address, BankAccountStep, CompanyDetailsStep, CompletedSteps, ContractStep,
    CreatedRepresentative, DocumentKind, DocumentUpload, NextStep, OnboardingStep, ProfileStep,
    RepresentativeInput, RepresentativesStep, RiskProfileStep, STEP_COUNT, StepPayload,
    StepResponse,
};

const STATUS_PATH: &str = "/onboarding/status";

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no onboarding token: submit the profile step or open the invitation link again")]
    MissingToken,

    /// Step 3 was accepted but a document upload failed. Representatives and
    /// documents listed here exist server-side; nothing is rolled back.
    #[error(
        "representatives saved but uploading {file_name:?} for representative {failed_representative} failed: {source}"
    )]
    PartialRepresentatives {
        created: Vec<RepresentativeId>,
        uploaded: Vec<DocumentId>,
        failed_representative: RepresentativeId,
        file_name: String,
        #[source]
        source: ApiError,
    },
}

impl OnboardingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OnboardingError::Api(e) => e.kind(),
            OnboardingError::MissingToken => ErrorKind::Reauthenticate,
            OnboardingError::PartialRepresentatives { source, .. } => source.kind(),
        }
    }
}

pub type OnboardingResult<T> = Result<T, OnboardingError>;

/// Result of a full step-3 submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RepresentativesOutcome {
    pub response: StepResponse,
    pub representatives: Vec<RepresentativeId>,
    pub documents: Vec<DocumentId>,
}

#[derive(Debug, Deserialize)]
struct UploadedDocument {
    id: DocumentId,
}

/// One wizard run, resumable from a continuation token.
#[derive(Debug)]
pub struct OnboardingSession {
    client: Arc<ApiClient>,
    token: Option<OnboardingToken>,
    current_step: usize,
    progress: CompletedSteps,
}

impl OnboardingSession {
    /// `token` is the one from the invitation link, if any.
    pub fn new(client: Arc<ApiClient>, token: Option<OnboardingToken>) -> Self {
        Self {
            client,
            token,
            current_step: 0,
            progress: CompletedSteps::default(),
        }
    }

    pub fn token(&self) -> Option<&OnboardingToken> {
        self.token.as_ref()
    }

    /// 0-based index of the step the wizard shows.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn step(&self) -> Option<OnboardingStep> {
        OnboardingStep::from_index(self.current_step)
    }

    pub fn progress(&self) -> CompletedSteps {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress.contract_signed || self.current_step >= STEP_COUNT
    }

    /// Load progress of an existing record (`GET /onboarding/status`).
    pub async fn resume(&mut self) -> OnboardingResult<StepResponse> {
        let token = self.token.as_ref().ok_or(OnboardingError::MissingToken)?;
        let request = ApiRequest::get(STATUS_PATH).query("token", token).anonymous();
        let response: StepResponse = self.client.send(request).await?;
        self.apply(&response);
        info!(current_step = self.current_step, "onboarding resumed");
        Ok(response)
    }

    /// Submit a typed step payload.
    pub async fn submit<P: StepPayload>(&mut self, payload: &P) -> OnboardingResult<StepResponse> {
        self.submit_step(P::STEP, payload).await
    }

    /// Submit `payload` to `step`'s endpoint with the current token.
    pub async fn submit_step<P>(&mut self, step: OnboardingStep, payload: &P) -> OnboardingResult<StepResponse>
    where
        P: serde::Serialize + Validate + ?Sized,
    {
        payload.validate().map_err(ApiError::from)?;

        if step != OnboardingStep::Profile && self.token.is_none() {
            return Err(OnboardingError::MissingToken);
        }

        let request = ApiRequest::new(step.method(), step.path())
            .query_opt("token", self.token.as_ref())
            .json(payload)?
            .anonymous();

        debug!(%step, "submitting onboarding step");
        let response: StepResponse = match self.client.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%step, error = %e, kind = ?e.kind(), "onboarding step rejected");
                return Err(e.into());
            }
        };

        self.apply(&response);
        info!(%step, current_step = self.current_step, "onboarding step accepted");
        Ok(response)
    }

    /// Step 3: create the representatives, then upload each one's documents.
    ///
    /// Uploads stop at the first failure, which is reported as
    /// [`OnboardingError::PartialRepresentatives`].
    pub async fn submit_representatives(
        &mut self,
        representatives: Vec<RepresentativeInput>,
    ) -> OnboardingResult<RepresentativesOutcome> {
        let step = RepresentativesStep { representatives };
        let response = self.submit(&step).await?;

        let created = created_representatives(&response);
        let ids: Vec<RepresentativeId> = created.iter().map(|c| c.id.clone()).collect();
        let mut uploaded = Vec::new();

        for (index, input) in step.representatives.iter().enumerate() {
            if input.documents.is_empty() {
                continue;
            }
            let Some(rep) = match_representative(&created, index, input) else {
                warn!(index, "representative missing from step response, documents skipped");
                continue;
            };

            for doc in &input.documents {
                match self.upload_document(&rep.id, doc).await {
                    Ok(id) => uploaded.push(id),
                    Err(source) => {
                        warn!(
                            representative = %rep.id,
                            file = %doc.file_name,
                            uploaded = uploaded.len(),
                            "document upload failed, representatives left partially documented"
                        );
                        return Err(OnboardingError::PartialRepresentatives {
                            created: ids,
                            uploaded,
                            failed_representative: rep.id.clone(),
                            file_name: doc.file_name.clone(),
                            source,
                        });
                    }
                }
            }
        }

        info!(representatives = ids.len(), documents = uploaded.len(), "representatives submitted");
        Ok(RepresentativesOutcome {
            response,
            representatives: ids,
            documents: uploaded,
        })
    }

    async fn upload_document(
        &self,
        representative: &RepresentativeId,
        doc: &DocumentUpload,
    ) -> Result<DocumentId, ApiError> {
        let path = format!("{}/{representative}/documents", OnboardingStep::Representatives.path());
        let upload = Upload {
            field: "file".to_string(),
            file_name: doc.file_name.clone(),
            mime: doc.mime.clone(),
            bytes: doc.bytes.clone(),
            fields: vec![("type".to_string(), doc.kind.as_str().to_string())],
        };
        let request = ApiRequest::post(path)
            .query_opt("token", self.token.as_ref())
            .multipart(upload)
            .anonymous();
        let uploaded: UploadedDocument = self.client.send(request).await?;
        Ok(uploaded.id)
    }

    fn apply(&mut self, response: &StepResponse) {
        if let Some(raw) = response.onboarding_token.as_deref() {
            match OnboardingToken::new(raw) {
                Ok(token) => {
                    if self.token.as_ref() != Some(&token) {
                        debug!("adopting onboarding token from response");
                    }
                    self.token = Some(token);
                }
                Err(_) => debug!("ignoring blank onboarding token in response"),
            }
        }

        if let Some(next) = &response.next_step {
            match usize::from(next.step).checked_sub(1) {
                Some(index) => self.current_step = index,
                None => warn!(step = next.step, "ignoring invalid nextStep"),
            }
        }

        if let Some(progress) = response.completed_steps {
            self.progress = progress;
        }
    }
}

fn created_representatives(response: &StepResponse) -> Vec<CreatedRepresentative> {
    response
        .data
        .get("representatives")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Match by CPF when the response carries it, by position otherwise.
fn match_representative<'a>(
    created: &'a [CreatedRepresentative],
    index: usize,
    input: &RepresentativeInput,
) -> Option<&'a CreatedRepresentative> {
    let digits: String = input.cpf.chars().filter(char::is_ascii_digit).collect();
    created
        .iter()
        .find(|c| c.cpf.as_deref().is_some_and(|cpf| cpf.chars().filter(char::is_ascii_digit).eq(digits.chars())))
        .or_else(|| created.get(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use zhex_auth::MemoryTokenStore;

    use crate::config::ClientConfig;

    fn session(token: Option<&str>) -> OnboardingSession {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        let client = ApiClient::new(config, Arc::new(MemoryTokenStore::new())).unwrap();
        OnboardingSession::new(Arc::new(client), token.map(|t| OnboardingToken::new(t).unwrap()))
    }

    fn response(body: serde_json::Value) -> StepResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn next_step_is_converted_to_zero_based_index() {
        let mut s = session(None);
        s.apply(&response(json!({ "nextStep": { "step": 3 } })));
        assert_eq!(s.current_step(), 2);
        assert_eq!(s.step(), Some(OnboardingStep::Representatives));
    }

    #[test]
    fn server_can_move_the_wizard_backwards() {
        let mut s = session(Some("t0"));
        s.apply(&response(json!({ "nextStep": { "step": 5 } })));
        s.apply(&response(json!({ "nextStep": { "step": 2 } })));
        assert_eq!(s.current_step(), 1);
    }

    #[test]
    fn response_token_replaces_link_token() {
        let mut s = session(Some("from-link"));
        s.apply(&response(json!({ "onboardingToken": "abc" })));
        assert_eq!(s.token().map(|t| t.as_str()), Some("abc"));

        // Absent or blank tokens keep the current one.
        s.apply(&response(json!({ "onboardingToken": "" })));
        s.apply(&response(json!({})));
        assert_eq!(s.token().map(|t| t.as_str()), Some("abc"));
    }

    #[test]
    fn completed_steps_are_cached() {
        let mut s = session(Some("t"));
        s.apply(&response(json!({
            "nextStep": { "step": 7 },
            "completedSteps": {
                "profile": true, "companyDetails": true, "representatives": true,
                "bankAccount": true, "riskProfile": true, "contractSigned": true
            }
        })));
        assert!(s.progress().all_done());
        assert!(s.is_complete());
        assert_eq!(s.step(), None);
    }

    #[test]
    fn step_zero_is_ignored() {
        let mut s = session(None);
        s.apply(&response(json!({ "nextStep": { "step": 2 } })));
        s.apply(&response(json!({ "nextStep": { "step": 0 } })));
        assert_eq!(s.current_step(), 1);
    }

    #[tokio::test]
    async fn later_steps_need_a_token() {
        let mut s = session(None);
        let contract = ContractStep {
            accepted: true,
            signer_name: "Ana".into(),
        };
        assert!(matches!(s.submit(&contract).await, Err(OnboardingError::MissingToken)));
        assert!(matches!(s.resume().await, Err(OnboardingError::MissingToken)));
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_network() {
        let mut s = session(Some("t"));
        let contract = ContractStep {
            accepted: false,
            signer_name: String::new(),
        };
        let err = s.submit(&contract).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn representatives_match_by_cpf_then_position() {
        let created: Vec<CreatedRepresentative> = serde_json::from_value(json!([
            { "id": "r1", "cpf": "98765432100" },
            { "id": "r2", "cpf": "12345678909" }
        ]))
        .unwrap();
        let input = RepresentativeInput {
            name: "Ana".into(),
            cpf: "123.456.789-09".into(),
            email: "a@b.com".into(),
            phone: "11987654321".into(),
            role: "partner".into(),
            documents: vec![],
        };
        assert_eq!(match_representative(&created, 0, &input).unwrap().id.as_str(), "r2");

        let anonymous: Vec<CreatedRepresentative> =
            serde_json::from_value(json!([{ "id": "r1" }, { "id": "r2" }])).unwrap();
        assert_eq!(match_representative(&anonymous, 1, &input).unwrap().id.as_str(), "r2");
    }
}
