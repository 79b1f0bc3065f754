//! Payload validation for milestone submissions.

use std::sync::OnceLock;
use regex::Regex;
use crate::milestone::{MilestoneFields, MilestoneType};

/// Every Karma GAP link must point at a project page under this prefix.
pub const KARMA_PROJECT_PREFIX: &str = "https://www.karmahq.xyz/project/";

/// Name of a submission payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    /// `contractAddress`
    ContractAddress,
    /// `karmaGapLink`
    KarmaGapLink,
    /// `farcasterLink`
    FarcasterLink,
    /// `slidesLink`
    SlidesLink,
    /// `pitchDeckLink`
    PitchDeckLink,
}

impl FieldName {
    /// Payload key as it appears in requests.
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldName::ContractAddress => "contractAddress",
            FieldName::KarmaGapLink => "karmaGapLink",
            FieldName::FarcasterLink => "farcasterLink",
            FieldName::SlidesLink => "slidesLink",
            FieldName::PitchDeckLink => "pitchDeckLink",
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Required field absent or blank
    #[error("{field} is required")]
    Missing {
        /// Offending field
        field: FieldName,
    },

    /// Field present but of the wrong shape
    #[error("Invalid {field}: {reason}")]
    Malformed {
        /// Offending field
        field: FieldName,
        /// What the value should look like
        reason: &'static str,
    },
}

impl FieldError {
    /// The field that failed.
    pub fn field(&self) -> FieldName {
        match self {
            FieldError::Missing { field } | FieldError::Malformed { field, .. } => *field,
        }
    }
}

/// Fields that passed validation for a specific milestone.
///
/// Only [`validate_payload`] constructs this, so holding one proves the
/// payload was checked against the rules of `milestone_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFields {
    milestone_type: MilestoneType,
    fields: MilestoneFields,
}

impl ValidatedFields {
    /// Milestone the fields were validated for.
    pub fn milestone_type(&self) -> MilestoneType {
        self.milestone_type
    }

    /// Normalized fields.
    pub fn fields(&self) -> &MilestoneFields {
        &self.fields
    }

    /// Take the normalized fields.
    pub fn into_fields(self) -> MilestoneFields {
        self.fields
    }
}

fn evm_address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static address pattern"))
}

fn zero_address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x0{40}$").expect("static zero address pattern"))
}

fn absolute_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+(?:[/?#]\S*)?$").expect("static URL pattern")
    })
}

/// `0x` followed by 40 hex characters.
pub fn is_evm_address(value: &str) -> bool {
    evm_address_pattern().is_match(value.trim())
}

/// An EVM address that is not the all-zero address.
pub fn is_valid_contract_address(value: &str) -> bool {
    let v = value.trim();
    is_evm_address(v) && !zero_address_pattern().is_match(v)
}

/// Scheme, `://` and a non-empty authority.
pub fn is_absolute_url(value: &str) -> bool {
    absolute_url_pattern().is_match(value.trim())
}

/// A Karma GAP project page with something after the prefix.
pub fn is_karma_project_url(value: &str) -> bool {
    let v = value.trim();
    v.starts_with(KARMA_PROJECT_PREFIX) && v.len() > KARMA_PROJECT_PREFIX.len()
}

/// Trim a raw value; blank becomes absent.
pub(crate) fn normalize(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn require<'a>(value: &'a Option<String>, field: FieldName) -> Result<&'a str, FieldError> {
    value.as_deref().ok_or(FieldError::Missing { field })
}

fn check_contract_address(value: &Option<String>) -> Result<(), FieldError> {
    let field = FieldName::ContractAddress;
    let v = require(value, field)?;
    if !is_evm_address(v) {
        return Err(FieldError::Malformed {
            field,
            reason: "expected 0x followed by 40 hexadecimal characters",
        });
    }
    if !is_valid_contract_address(v) {
        return Err(FieldError::Malformed {
            field,
            reason: "the zero address is not a deployed contract",
        });
    }
    Ok(())
}

fn check_karma_link(value: &str) -> Result<(), FieldError> {
    if is_karma_project_url(value) {
        Ok(())
    } else {
        Err(FieldError::Malformed {
            field: FieldName::KarmaGapLink,
            reason: "must be a project page under https://www.karmahq.xyz/project/",
        })
    }
}

fn check_url(value: &Option<String>, field: FieldName) -> Result<(), FieldError> {
    let v = require(value, field)?;
    if is_absolute_url(v) {
        Ok(())
    } else {
        Err(FieldError::Malformed {
            field,
            reason: "expected an absolute URL",
        })
    }
}

/// Validate a submission payload for `milestone_type`.
///
/// Values are trimmed and blank values dropped before checking. A non-empty
/// `karmaGapLink` is held to the Karma GAP prefix rule on every milestone.
pub fn validate_payload(
    milestone_type: MilestoneType,
    raw: &MilestoneFields,
) -> Result<ValidatedFields, FieldError> {
    let fields = MilestoneFields {
        contract_address: normalize(raw.contract_address.as_deref()),
        karma_gap_link: normalize(raw.karma_gap_link.as_deref()),
        farcaster_link: normalize(raw.farcaster_link.as_deref()),
        slides_link: normalize(raw.slides_link.as_deref()),
        pitch_deck_link: normalize(raw.pitch_deck_link.as_deref()),
    };

    match milestone_type {
        MilestoneType::Registration => {}
        MilestoneType::Testnet | MilestoneType::Mainnet => {
            check_contract_address(&fields.contract_address)?;
        }
        MilestoneType::KarmaGap => {
            require(&fields.karma_gap_link, FieldName::KarmaGapLink)?;
        }
        MilestoneType::Farcaster => {
            check_url(&fields.farcaster_link, FieldName::FarcasterLink)?;
        }
        MilestoneType::FinalSubmission => {
            check_url(&fields.slides_link, FieldName::SlidesLink)?;
            check_url(&fields.pitch_deck_link, FieldName::PitchDeckLink)?;
        }
    }

    if let Some(link) = &fields.karma_gap_link {
        check_karma_link(link)?;
    }

    Ok(ValidatedFields { milestone_type, fields })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";

    fn contract(address: &str) -> MilestoneFields {
        MilestoneFields {
            contract_address: Some(address.to_string()),
            ..Default::default()
        }
    }

    fn karma(link: &str) -> MilestoneFields {
        MilestoneFields {
            karma_gap_link: Some(link.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_registration_needs_nothing() {
        let validated = validate_payload(MilestoneType::Registration, &MilestoneFields::default()).unwrap();
        assert_eq!(validated.milestone_type(), MilestoneType::Registration);
        assert_eq!(validated.fields(), &MilestoneFields::default());
    }

    #[test]
    fn test_testnet_address_rules() {
        assert!(validate_payload(MilestoneType::Testnet, &contract(ADDRESS)).is_ok());

        let zero = format!("0x{}", "0".repeat(40));
        let err = validate_payload(MilestoneType::Testnet, &contract(&zero)).unwrap_err();
        assert!(matches!(err, FieldError::Malformed { field: FieldName::ContractAddress, .. }));

        let err = validate_payload(MilestoneType::Testnet, &contract("0xabc")).unwrap_err();
        assert!(matches!(err, FieldError::Malformed { field: FieldName::ContractAddress, .. }));

        let err = validate_payload(MilestoneType::Testnet, &MilestoneFields::default()).unwrap_err();
        assert_eq!(err, FieldError::Missing { field: FieldName::ContractAddress });
    }

    #[test]
    fn test_mainnet_uses_same_address_rule() {
        assert!(validate_payload(MilestoneType::Mainnet, &contract(ADDRESS)).is_ok());
        let not_hex = format!("0x{}", "g".repeat(40));
        assert!(validate_payload(MilestoneType::Mainnet, &contract(&not_hex)).is_err());
        assert!(validate_payload(MilestoneType::Mainnet, &contract(&ADDRESS[2..])).is_err());
    }

    #[test]
    fn test_address_is_trimmed() {
        let padded = format!("  {}  ", ADDRESS);
        let validated = validate_payload(MilestoneType::Testnet, &contract(&padded)).unwrap();
        assert_eq!(validated.fields().contract_address.as_deref(), Some(ADDRESS));
    }

    #[test]
    fn test_karma_gap_link_rules() {
        assert!(validate_payload(MilestoneType::KarmaGap, &karma("https://www.karmahq.xyz/project/abc")).is_ok());

        let err = validate_payload(MilestoneType::KarmaGap, &karma("https://www.karmahq.xyz/project/")).unwrap_err();
        assert!(matches!(err, FieldError::Malformed { field: FieldName::KarmaGapLink, .. }));

        let err = validate_payload(MilestoneType::KarmaGap, &karma("https://example.com")).unwrap_err();
        assert!(matches!(err, FieldError::Malformed { field: FieldName::KarmaGapLink, .. }));

        let err = validate_payload(MilestoneType::KarmaGap, &karma("   ")).unwrap_err();
        assert_eq!(err, FieldError::Missing { field: FieldName::KarmaGapLink });
    }

    #[test]
    fn test_karma_link_checked_on_other_milestones() {
        let mut fields = contract(ADDRESS);
        fields.karma_gap_link = Some("https://example.com/project".to_string());
        let err = validate_payload(MilestoneType::Mainnet, &fields).unwrap_err();
        assert_eq!(err.field(), FieldName::KarmaGapLink);

        fields.karma_gap_link = Some(String::new());
        let validated = validate_payload(MilestoneType::Mainnet, &fields).unwrap();
        assert_eq!(validated.fields().karma_gap_link, None);

        fields.karma_gap_link = Some("https://www.karmahq.xyz/project/celo-dapp".to_string());
        assert!(validate_payload(MilestoneType::Mainnet, &fields).is_ok());
    }

    #[test]
    fn test_farcaster_needs_url() {
        let fields = MilestoneFields {
            farcaster_link: Some("https://farcaster.xyz/miniapps/abc/app".to_string()),
            ..Default::default()
        };
        assert!(validate_payload(MilestoneType::Farcaster, &fields).is_ok());

        let fields = MilestoneFields {
            farcaster_link: Some("farcaster app".to_string()),
            ..Default::default()
        };
        let err = validate_payload(MilestoneType::Farcaster, &fields).unwrap_err();
        assert!(matches!(err, FieldError::Malformed { field: FieldName::FarcasterLink, .. }));
    }

    #[test]
    fn test_final_submission_needs_both_links() {
        let mut fields = MilestoneFields {
            slides_link: Some("https://docs.google.com/presentation/d/1".to_string()),
            ..Default::default()
        };
        let err = validate_payload(MilestoneType::FinalSubmission, &fields).unwrap_err();
        assert_eq!(err, FieldError::Missing { field: FieldName::PitchDeckLink });

        fields.pitch_deck_link = Some("https://youtu.be/pitch".to_string());
        assert!(validate_payload(MilestoneType::FinalSubmission, &fields).is_ok());

        fields.slides_link = Some("slides.pdf".to_string());
        let err = validate_payload(MilestoneType::FinalSubmission, &fields).unwrap_err();
        assert_eq!(err.field(), FieldName::SlidesLink);
    }

    #[test]
    fn test_absolute_url_shapes() {
        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("http://localhost:3000/path?q=1#frag"));
        assert!(is_absolute_url("ipfs://bafybeigdyrzt"));
        assert!(!is_absolute_url("example.com"));
        assert!(!is_absolute_url("https://"));
        assert!(!is_absolute_url("https://exa mple.com"));
        assert!(!is_absolute_url(""));
    }

    #[test]
    fn test_error_messages() {
        let err = FieldError::Missing { field: FieldName::SlidesLink };
        assert_eq!(err.to_string(), "slidesLink is required");
        let err = FieldError::Malformed { field: FieldName::FarcasterLink, reason: "expected an absolute URL" };
        assert_eq!(err.to_string(), "Invalid farcasterLink: expected an absolute URL");
    }
}
