//! The six onboarding steps and their payloads.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use zhex_core::validation::{self, Checks};
use zhex_core::{Amount, DomainError, DomainResult, Email, FieldErrors, RepresentativeId, Validate};

pub const STEP_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OnboardingStep {
    Profile,
    CompanyDetails,
    Representatives,
    BankAccount,
    RiskProfile,
    Contract,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; STEP_COUNT] = [
        OnboardingStep::Profile,
        OnboardingStep::CompanyDetails,
        OnboardingStep::Representatives,
        OnboardingStep::BankAccount,
        OnboardingStep::RiskProfile,
        OnboardingStep::Contract,
    ];

    /// 1-based number used by the API.
    pub fn number(self) -> u8 {
        match self {
            OnboardingStep::Profile => 1,
            OnboardingStep::CompanyDetails => 2,
            OnboardingStep::Representatives => 3,
            OnboardingStep::BankAccount => 4,
            OnboardingStep::RiskProfile => 5,
            OnboardingStep::Contract => 6,
        }
    }

    /// 0-based position in the wizard.
    pub fn index(self) -> usize {
        usize::from(self.number() - 1)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn path(self) -> &'static str {
        match self {
            OnboardingStep::Profile => "/onboarding/step-1/profile",
            OnboardingStep::CompanyDetails => "/onboarding/step-2/company-details",
            OnboardingStep::Representatives => "/onboarding/step-3/representatives",
            OnboardingStep::BankAccount => "/onboarding/step-4/bank-account",
            OnboardingStep::RiskProfile => "/onboarding/step-5/risk-profile",
            OnboardingStep::Contract => "/onboarding/step-6/contract",
        }
    }

    /// Step 1 creates the onboarding record; the others update it.
    pub fn method(self) -> Method {
        match self {
            OnboardingStep::Profile => Method::POST,
            _ => Method::PUT,
        }
    }
}

impl core::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            OnboardingStep::Profile => "profile",
            OnboardingStep::CompanyDetails => "company details",
            OnboardingStep::Representatives => "representatives",
            OnboardingStep::BankAccount => "bank account",
            OnboardingStep::RiskProfile => "risk profile",
            OnboardingStep::Contract => "contract",
        };
        write!(f, "step {} ({name})", self.number())
    }
}

/// A payload bound to its step.
pub trait StepPayload: Serialize + Validate {
    const STEP: OnboardingStep;
}

/// `nextStep` of a step response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub step: u8,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `completedSteps` of a step response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletedSteps {
    pub profile: bool,
    pub company_details: bool,
    pub representatives: bool,
    pub bank_account: bool,
    pub risk_profile: bool,
    pub contract_signed: bool,
}

impl CompletedSteps {
    pub fn is_done(&self, step: OnboardingStep) -> bool {
        match step {
            OnboardingStep::Profile => self.profile,
            OnboardingStep::CompanyDetails => self.company_details,
            OnboardingStep::Representatives => self.representatives,
            OnboardingStep::BankAccount => self.bank_account,
            OnboardingStep::RiskProfile => self.risk_profile,
            OnboardingStep::Contract => self.contract_signed,
        }
    }

    pub fn all_done(&self) -> bool {
        OnboardingStep::ALL.iter().all(|step| self.is_done(*step))
    }
}

/// Body returned by every step endpoint and by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    #[serde(default)]
    pub next_step: Option<NextStep>,
    #[serde(default)]
    pub onboarding_token: Option<String>,
    #[serde(default)]
    pub completed_steps: Option<CompletedSteps>,
    /// Step-specific data.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Step 1
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStep {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
}

impl Validate for ProfileStep {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("fullName", validation::required("fullName", &self.full_name));
        checks.check("fullName", validation::max_len("fullName", &self.full_name, 120));
        checks.check("email", Email::parse(&self.email));
        checks.check("phone", validation::digits("phone", &self.phone, 10, 13));
        checks.check("cpf", validation::digits("cpf", &self.cpf, 11, 11));
        checks.finish()
    }
}

impl StepPayload for ProfileStep {
    const STEP: OnboardingStep = OnboardingStep::Profile;
}

// ---------------------------------------------------------------------------
// Step 2
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub zip_code: String,
    pub street: String,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    /// Two-letter state code.
    pub state: String,
}

impl Address {
    fn check_into(&self, checks: &mut Checks, prefix: &str) {
        let field = |name: &str| format!("{prefix}.{name}");
        checks.check(&field("zipCode"), validation::digits("zipCode", &self.zip_code, 8, 8));
        for (name, value) in [
            ("street", &self.street),
            ("number", &self.number),
            ("neighborhood", &self.neighborhood),
            ("city", &self.city),
        ] {
            checks.check(&field(name), validation::required(name, value));
        }
        if self.state.len() != 2 || !self.state.chars().all(|c| c.is_ascii_alphabetic()) {
            checks.fail(&field("state"), "must be a two-letter state code");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetailsStep {
    pub cnpj: String,
    pub legal_name: String,
    pub trade_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub address: Address,
}

impl Validate for CompanyDetailsStep {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("cnpj", validation::digits("cnpj", &self.cnpj, 14, 14));
        checks.check("legalName", validation::required("legalName", &self.legal_name));
        checks.check("tradeName", validation::required("tradeName", &self.trade_name));
        if let Some(website) = &self.website {
            if url::Url::parse(website).is_err() {
                checks.fail("website", "must be a valid URL");
            }
        }
        self.address.check_into(&mut checks, "address");
        checks.finish()
    }
}

impl StepPayload for CompanyDetailsStep {
    const STEP: OnboardingStep = OnboardingStep::CompanyDetails;
}

// ---------------------------------------------------------------------------
// Step 3
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdentityFront,
    IdentityBack,
    ProofOfAddress,
    Selfie,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::IdentityFront => "identity_front",
            DocumentKind::IdentityBack => "identity_back",
            DocumentKind::ProofOfAddress => "proof_of_address",
            DocumentKind::Selfie => "selfie",
        }
    }
}

/// A file to attach to a representative after it was created.
#[derive(Clone, PartialEq)]
pub struct DocumentUpload {
    pub kind: DocumentKind,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl core::fmt::Debug for DocumentUpload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentUpload")
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
const DOCUMENT_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepresentativeInput {
    pub name: String,
    pub cpf: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    #[serde(skip)]
    pub documents: Vec<DocumentUpload>,
}

impl Validate for RepresentativeInput {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("name", validation::required("name", &self.name));
        checks.check("cpf", validation::digits("cpf", &self.cpf, 11, 11));
        checks.check("email", Email::parse(&self.email));
        checks.check("phone", validation::digits("phone", &self.phone, 10, 13));
        checks.check("role", validation::required("role", &self.role));
        for (i, doc) in self.documents.iter().enumerate() {
            let field = format!("documents[{i}]");
            if doc.bytes.is_empty() {
                checks.fail(&field, "file is empty");
            } else if doc.bytes.len() > MAX_DOCUMENT_BYTES {
                checks.fail(&field, "file is larger than 10 MB");
            } else if !DOCUMENT_MIME_TYPES.contains(&doc.mime.as_str()) {
                checks.fail(&field, "must be a JPEG, PNG or PDF file");
            }
        }
        checks.finish()
    }
}

/// Body of step 3. Documents are uploaded separately, per representative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepresentativesStep {
    pub representatives: Vec<RepresentativeInput>,
}

impl Validate for RepresentativesStep {
    fn validate(&self) -> DomainResult<()> {
        if self.representatives.is_empty() {
            return Err(DomainError::field("representatives", "at least one representative is required"));
        }
        let mut errors = FieldErrors::new();
        for (i, rep) in self.representatives.iter().enumerate() {
            if let Err(DomainError::Validation(fields)) = rep.validate() {
                for (field, msg) in fields.iter() {
                    errors.add(format!("representatives[{i}].{field}"), msg);
                }
            }
        }
        errors.into_result()
    }
}

impl StepPayload for RepresentativesStep {
    const STEP: OnboardingStep = OnboardingStep::Representatives;
}

/// Representative record as echoed back by step 3.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedRepresentative {
    pub id: RepresentativeId,
    #[serde(default)]
    pub cpf: Option<String>,
}

// ---------------------------------------------------------------------------
// Step 4
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountStep {
    pub bank_code: String,
    pub agency: String,
    pub account: String,
    pub account_digit: String,
    pub account_type: AccountType,
}

impl Validate for BankAccountStep {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("bankCode", validation::digits("bankCode", &self.bank_code, 3, 3));
        checks.check("agency", validation::digits("agency", &self.agency, 4, 5));
        checks.check("account", validation::digits("account", &self.account, 1, 12));
        if self.account_digit.trim().is_empty() || self.account_digit.trim().len() > 2 {
            checks.fail("accountDigit", "must have one or two characters");
        }
        checks.finish()
    }
}

impl StepPayload for BankAccountStep {
    const STEP: OnboardingStep = OnboardingStep::BankAccount;
}

// ---------------------------------------------------------------------------
// Step 5
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfileStep {
    pub business_category: String,
    pub average_ticket: Amount,
    pub monthly_volume: Amount,
    pub sells_physical_goods: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_policy_url: Option<String>,
}

impl Validate for RiskProfileStep {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check(
            "businessCategory",
            validation::required("businessCategory", &self.business_category),
        );
        checks.check("averageTicket", Amount::positive(self.average_ticket.cents()));
        checks.check("monthlyVolume", Amount::positive(self.monthly_volume.cents()));
        if self.average_ticket > self.monthly_volume {
            checks.fail("averageTicket", "must not exceed the monthly volume");
        }
        checks.finish()
    }
}

impl StepPayload for RiskProfileStep {
    const STEP: OnboardingStep = OnboardingStep::RiskProfile;
}

// ---------------------------------------------------------------------------
// Step 6
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractStep {
    pub accepted: bool,
    pub signer_name: String,
}

impl Validate for ContractStep {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        if !self.accepted {
            checks.fail("accepted", "the contract must be accepted");
        }
        checks.check("signerName", validation::required("signerName", &self.signer_name));
        checks.finish()
    }
}

impl StepPayload for ContractStep {
    const STEP: OnboardingStep = OnboardingStep::Contract;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn representative(cpf: &str) -> RepresentativeInput {
        RepresentativeInput {
            name: "Ana Souza".into(),
            cpf: cpf.into(),
            email: "ana@acme.com".into(),
            phone: "11987654321".into(),
            role: "partner".into(),
            documents: vec![DocumentUpload {
                kind: DocumentKind::IdentityFront,
                file_name: "rg.png".into(),
                mime: "image/png".into(),
                bytes: vec![1, 2, 3],
            }],
        }
    }

    #[test]
    fn step_numbering_and_endpoints() {
        assert_eq!(OnboardingStep::Profile.method(), Method::POST);
        assert_eq!(OnboardingStep::Contract.method(), Method::PUT);
        for (i, step) in OnboardingStep::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(OnboardingStep::from_index(i), Some(*step));
            assert!(step.path().starts_with(&format!("/onboarding/step-{}/", step.number())));
        }
        assert_eq!(OnboardingStep::from_index(6), None);
    }

    #[test]
    fn representatives_errors_are_indexed() {
        let step = RepresentativesStep {
            representatives: vec![representative("123.456.789-09"), representative("1")],
        };
        let err = step.validate().unwrap_err();
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.get("representatives[1].cpf").is_some());
    }

    #[test]
    fn documents_are_not_part_of_the_step_body() {
        let step = RepresentativesStep {
            representatives: vec![representative("12345678909")],
        };
        let body = serde_json::to_value(&step).unwrap();
        assert_eq!(
            body,
            json!({ "representatives": [{
                "name": "Ana Souza",
                "cpf": "12345678909",
                "email": "ana@acme.com",
                "phone": "11987654321",
                "role": "partner"
            }]})
        );
    }

    #[test]
    fn address_fields_are_prefixed() {
        let step = CompanyDetailsStep {
            cnpj: "12.345.678/0001-95".into(),
            legal_name: "Acme LTDA".into(),
            trade_name: "Acme".into(),
            website: None,
            address: Address {
                zip_code: "0131".into(),
                street: "Av. Paulista".into(),
                number: "1000".into(),
                complement: None,
                neighborhood: "Bela Vista".into(),
                city: "São Paulo".into(),
                state: "SPX".into(),
            },
        };
        let err = step.validate().unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.get("address.zipCode").is_some());
        assert!(fields.get("address.state").is_some());
        assert!(fields.get("cnpj").is_none());
    }

    #[test]
    fn contract_must_be_accepted() {
        let contract = ContractStep {
            accepted: false,
            signer_name: "Ana".into(),
        };
        assert!(contract.validate().is_err());
    }

    #[test]
    fn step_response_keeps_step_data() {
        let response: StepResponse = serde_json::from_value(json!({
            "nextStep": { "step": 3, "title": "Sócios" },
            "onboardingToken": "abc",
            "completedSteps": { "profile": true, "companyDetails": true },
            "representatives": []
        }))
        .unwrap();

        assert_eq!(response.next_step.as_ref().map(|n| n.step), Some(3));
        let completed = response.completed_steps.unwrap();
        assert!(completed.is_done(OnboardingStep::CompanyDetails));
        assert!(!completed.all_done());
        assert!(response.data.contains_key("representatives"));
    }
}
