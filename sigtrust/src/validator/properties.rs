//! Policy table consulted by the validators, keyed by [`ValidationContext`]
//!
//! [`SignatureValidationProperties`] holds default [`PolicyProperties`] plus an ordered list of
//! [`ContextProperties`] overrides. Lookup for a context walks the overrides from the most recently
//! added to the first and uses the first one whose criteria match the context and which sets the
//! requested property. If none does, the defaults are consulted, then a built-in value.
//!
//! ```
//! use sigtrust::*;
//!
//! let mut props = SignatureValidationProperties::default();
//! props.set_online_fetching(ValidationContexts::all(), OnlineFetching::NeverFetch);
//! props.set_continue_after_failure(
//!     ValidationContexts::all().with_sources(&[CertificateSource::SignerCert]),
//!     false,
//! );
//! let ctx = ValidationContext::signer_present();
//! assert_eq!(OnlineFetching::NeverFetch, props.get_online_fetching(&ctx));
//! assert!(!props.get_continue_after_failure(&ctx));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use log::error;
use serde::{Deserialize, Serialize};
use x509_cert::ext::pkix::KeyUsages;

use pkiprocmacros::pp_gets_and_sets;

use crate::source::file_utils::get_file_as_byte_vec;
use crate::util::error::{Error, Result};
use crate::validator::context::*;
use crate::validator::extensions::CertificateExtension;

/// Name of the [`OnlineFetching`] property
pub const PP_ONLINE_FETCHING: &str = "ppOnlineFetching";
/// Name of the freshness property, expressed in seconds
pub const PP_FRESHNESS: &str = "ppFreshness";
/// Name of the continue-after-failure property
pub const PP_CONTINUE_AFTER_FAILURE: &str = "ppContinueAfterFailure";
/// Name of the required extensions property
pub const PP_REQUIRED_EXTENSIONS: &str = "ppRequiredExtensions";
/// Name of the [`RevocationEvidencePreference`] property
pub const PP_EVIDENCE_PREFERENCE: &str = "ppEvidencePreference";

/// Freshness used for present-time validation when nothing else is configured
pub const DEFAULT_FRESHNESS_PRESENT: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Freshness used for historical validation when nothing else is configured
pub const DEFAULT_FRESHNESS_HISTORICAL: Duration = Duration::from_secs(60);

/// Controls whether the default online OCSP and CRL clients are consulted
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OnlineFetching {
    /// Always query the online clients in addition to configured clients
    AlwaysFetch,
    /// Query the online clients only when configured clients yielded nothing
    FetchIfNoOtherDataAvailable,
    /// Never query the online clients
    NeverFetch,
}

/// Controls which kind of evidence is tried first when an OCSP response and a CRL share the same
/// this-update time
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RevocationEvidencePreference {
    /// OCSP response first
    PreferOcsp,
    /// CRL first
    PreferCrl,
}

/// `RequiredExtensions` is a typedef for a list of [`CertificateExtension`] predicates.
pub type RequiredExtensions = Vec<CertificateExtension>;

/// Variant type for values stored in a [`PolicyProperties`] map
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PolicyPropertyTypes {
    /// Represents bool values
    Bool(bool),
    /// Represents u64 values
    U64(u64),
    /// Represents [`OnlineFetching`] values
    OnlineFetching(OnlineFetching),
    /// Represents [`RequiredExtensions`] values
    RequiredExtensions(RequiredExtensions),
    /// Represents [`RevocationEvidencePreference`] values
    RevocationEvidencePreference(RevocationEvidencePreference),
}

/// `PolicyProperties` maps `PP_*` names to values. Getters return `None` for unset properties.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PolicyProperties(pub BTreeMap<String, PolicyPropertyTypes>);

impl PolicyProperties {
    /// Creates a new empty [`PolicyProperties`]
    pub fn new() -> Self {
        Self::default()
    }

    pp_gets_and_sets!(PP_ONLINE_FETCHING, OnlineFetching);
    pp_gets_and_sets!(PP_FRESHNESS, u64);
    pp_gets_and_sets!(PP_CONTINUE_AFTER_FAILURE, bool);
    pp_gets_and_sets!(PP_REQUIRED_EXTENSIONS, RequiredExtensions);
    pp_gets_and_sets!(PP_EVIDENCE_PREFERENCE, RevocationEvidencePreference);
}

/// Criteria selecting the contexts an override applies to. An empty set matches every value of
/// that component.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidationContexts {
    #[serde(default)]
    validators: BTreeSet<ValidatorContext>,
    #[serde(default)]
    sources: BTreeSet<CertificateSource>,
    #[serde(default)]
    time_bases: BTreeSet<TimeBasedContext>,
}

impl ValidationContexts {
    /// Criteria matching every context
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the criteria to the given validator stages
    pub fn with_validators(mut self, validators: &[ValidatorContext]) -> Self {
        self.validators = validators.iter().copied().collect();
        self
    }

    /// Restricts the criteria to the given certificate sources
    pub fn with_sources(mut self, sources: &[CertificateSource]) -> Self {
        self.sources = sources.iter().copied().collect();
        self
    }

    /// Restricts the criteria to the given time bases
    pub fn with_time_bases(mut self, time_bases: &[TimeBasedContext]) -> Self {
        self.time_bases = time_bases.iter().copied().collect();
        self
    }

    /// Returns true if the context satisfies every component of the criteria
    pub fn matches(&self, ctx: &ValidationContext) -> bool {
        (self.validators.is_empty() || self.validators.contains(&ctx.validator()))
            && (self.sources.is_empty() || self.sources.contains(&ctx.certificate_source()))
            && (self.time_bases.is_empty() || self.time_bases.contains(&ctx.time_basis()))
    }
}

/// Properties that apply to the contexts matched by the criteria
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContextProperties {
    /// Criteria
    pub contexts: ValidationContexts,
    /// Values
    pub properties: PolicyProperties,
}

fn source_requirements(
    source: CertificateSource,
    extensions: RequiredExtensions,
) -> ContextProperties {
    let mut properties = PolicyProperties::new();
    properties.set_required_extensions(extensions);
    ContextProperties {
        contexts: ValidationContexts::all().with_sources(&[source]),
        properties,
    }
}

fn default_overrides() -> Vec<ContextProperties> {
    let mut present = PolicyProperties::new();
    present.set_freshness(DEFAULT_FRESHNESS_PRESENT.as_secs());
    let mut historical = PolicyProperties::new();
    historical.set_freshness(DEFAULT_FRESHNESS_HISTORICAL.as_secs());

    vec![
        ContextProperties {
            contexts: ValidationContexts::all().with_time_bases(&[TimeBasedContext::Present]),
            properties: present,
        },
        ContextProperties {
            contexts: ValidationContexts::all().with_time_bases(&[TimeBasedContext::Historical]),
            properties: historical,
        },
        source_requirements(
            CertificateSource::CertIssuer,
            vec![
                CertificateExtension::key_usage(KeyUsages::KeyCertSign),
                CertificateExtension::basic_constraints(true),
            ],
        ),
        source_requirements(
            CertificateSource::OcspIssuer,
            vec![CertificateExtension::ocsp_signing()],
        ),
        source_requirements(
            CertificateSource::CrlIssuer,
            vec![CertificateExtension::key_usage(KeyUsages::CRLSign)],
        ),
        source_requirements(
            CertificateSource::TimestampCert,
            vec![CertificateExtension::time_stamping()],
        ),
    ]
}

/// Per-context policy table. See the module documentation for lookup rules.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignatureValidationProperties {
    #[serde(default)]
    defaults: PolicyProperties,
    #[serde(default = "default_overrides")]
    overrides: Vec<ContextProperties>,
}

impl Default for SignatureValidationProperties {
    fn default() -> Self {
        SignatureValidationProperties {
            defaults: PolicyProperties::new(),
            overrides: default_overrides(),
        }
    }
}

impl SignatureValidationProperties {
    /// Creates a table with no overrides at all, i.e., without the built-in extension requirements
    /// and freshness windows.
    pub fn empty() -> Self {
        SignatureValidationProperties {
            defaults: PolicyProperties::new(),
            overrides: vec![],
        }
    }

    /// Mutable access to the properties used when no override matches
    pub fn defaults_mut(&mut self) -> &mut PolicyProperties {
        &mut self.defaults
    }

    /// Appends an override. Later overrides take precedence over earlier ones.
    pub fn add_context_properties(&mut self, cp: ContextProperties) -> &mut Self {
        self.overrides.push(cp);
        self
    }

    fn lookup<T>(
        &self,
        ctx: &ValidationContext,
        getter: impl Fn(&PolicyProperties) -> Option<T>,
    ) -> Option<T> {
        self.overrides
            .iter()
            .rev()
            .filter(|cp| cp.contexts.matches(ctx))
            .find_map(|cp| getter(&cp.properties))
            .or_else(|| getter(&self.defaults))
    }

    fn push_override(
        &mut self,
        contexts: ValidationContexts,
        setter: impl FnOnce(&mut PolicyProperties),
    ) -> &mut Self {
        let mut properties = PolicyProperties::new();
        setter(&mut properties);
        self.add_context_properties(ContextProperties {
            contexts,
            properties,
        })
    }

    /// Online fetching mode for the context, `FetchIfNoOtherDataAvailable` if unset
    pub fn get_online_fetching(&self, ctx: &ValidationContext) -> OnlineFetching {
        self.lookup(ctx, PolicyProperties::get_online_fetching)
            .unwrap_or(OnlineFetching::FetchIfNoOtherDataAvailable)
    }

    /// Sets the online fetching mode for the matching contexts
    pub fn set_online_fetching(
        &mut self,
        contexts: ValidationContexts,
        v: OnlineFetching,
    ) -> &mut Self {
        self.push_override(contexts, |p| {
            p.set_online_fetching(v);
        })
    }

    /// Maximum age of revocation evidence for the context
    pub fn get_freshness(&self, ctx: &ValidationContext) -> Duration {
        match self.lookup(ctx, PolicyProperties::get_freshness) {
            Some(secs) => Duration::from_secs(secs),
            None => match ctx.time_basis() {
                TimeBasedContext::Present => DEFAULT_FRESHNESS_PRESENT,
                TimeBasedContext::Historical => DEFAULT_FRESHNESS_HISTORICAL,
            },
        }
    }

    /// Sets the freshness window for the matching contexts
    pub fn set_freshness(&mut self, contexts: ValidationContexts, v: Duration) -> &mut Self {
        self.push_override(contexts, |p| {
            p.set_freshness(v.as_secs());
        })
    }

    /// Whether chain walking continues after an INVALID finding, true if unset
    pub fn get_continue_after_failure(&self, ctx: &ValidationContext) -> bool {
        self.lookup(ctx, PolicyProperties::get_continue_after_failure)
            .unwrap_or(true)
    }

    /// Sets continue-after-failure for the matching contexts
    pub fn set_continue_after_failure(
        &mut self,
        contexts: ValidationContexts,
        v: bool,
    ) -> &mut Self {
        self.push_override(contexts, |p| {
            p.set_continue_after_failure(v);
        })
    }

    /// Globally required extensions for the context, empty if unset
    pub fn get_required_extensions(&self, ctx: &ValidationContext) -> RequiredExtensions {
        self.lookup(ctx, PolicyProperties::get_required_extensions)
            .unwrap_or_default()
    }

    /// Sets the globally required extensions for the matching contexts
    pub fn set_required_extensions(
        &mut self,
        contexts: ValidationContexts,
        v: RequiredExtensions,
    ) -> &mut Self {
        self.push_override(contexts, |p| {
            p.set_required_extensions(v);
        })
    }

    /// Tie-break between OCSP and CRL evidence with equal this-update, `PreferOcsp` if unset
    pub fn get_evidence_preference(&self, ctx: &ValidationContext) -> RevocationEvidencePreference {
        self.lookup(ctx, PolicyProperties::get_evidence_preference)
            .unwrap_or(RevocationEvidencePreference::PreferOcsp)
    }

    /// Sets the OCSP/CRL tie-break for the matching contexts
    pub fn set_evidence_preference(
        &mut self,
        contexts: ValidationContexts,
        v: RevocationEvidencePreference,
    ) -> &mut Self {
        self.push_override(contexts, |p| {
            p.set_evidence_preference(v);
        })
    }
}

/// `read_properties` accepts the name of a file that notionally contains JSON data that represents
/// [`SignatureValidationProperties`]. When no file name is given, the default table is returned.
pub fn read_properties(fname: &Option<String>) -> Result<SignatureValidationProperties> {
    if let Some(fname) = fname {
        let json = get_file_as_byte_vec(Path::new(fname.as_str()))?;
        return match serde_json::from_slice(&json) {
            Ok(props) => Ok(props),
            Err(e) => {
                error!("Failed to parse validation properties from {}: {}", fname, e);
                Err(Error::ParseError)
            }
        };
    }
    Ok(SignatureValidationProperties::default())
}

#[test]
fn test_default_gets() {
    let props = SignatureValidationProperties::default();
    let signer = ValidationContext::signer_present();
    assert_eq!(
        OnlineFetching::FetchIfNoOtherDataAvailable,
        props.get_online_fetching(&signer)
    );
    assert!(props.get_continue_after_failure(&signer));
    assert_eq!(DEFAULT_FRESHNESS_PRESENT, props.get_freshness(&signer));
    assert_eq!(
        DEFAULT_FRESHNESS_HISTORICAL,
        props.get_freshness(&signer.with_time_basis(TimeBasedContext::Historical))
    );
    assert!(props.get_required_extensions(&signer).is_empty());
    assert_eq!(
        2,
        props
            .get_required_extensions(&signer.with_certificate_source(CertificateSource::CertIssuer))
            .len()
    );
    assert_eq!(
        vec![CertificateExtension::key_usage(KeyUsages::CRLSign)],
        props.get_required_extensions(
            &signer.with_certificate_source(CertificateSource::CrlIssuer)
        )
    );
    assert_eq!(
        RevocationEvidencePreference::PreferOcsp,
        props.get_evidence_preference(&signer)
    );
}

#[test]
fn test_later_override_wins() {
    let mut props = SignatureValidationProperties::default();
    let crl_ctx = ValidationContext::signer_present()
        .with_validator(ValidatorContext::CrlValidator)
        .with_certificate_source(CertificateSource::CrlIssuer);

    props.set_freshness(
        ValidationContexts::all().with_validators(&[ValidatorContext::CrlValidator]),
        Duration::from_secs(10),
    );
    assert_eq!(Duration::from_secs(10), props.get_freshness(&crl_ctx));
    assert_eq!(
        DEFAULT_FRESHNESS_PRESENT,
        props.get_freshness(&ValidationContext::signer_present())
    );

    props.set_required_extensions(ValidationContexts::all(), vec![]);
    assert!(props.get_required_extensions(&crl_ctx).is_empty());

    // a narrower but older override does not hide a newer broad one
    props.set_freshness(ValidationContexts::all(), Duration::from_secs(20));
    assert_eq!(Duration::from_secs(20), props.get_freshness(&crl_ctx));
}

#[test]
fn test_properties_json() {
    let mut props = SignatureValidationProperties::default();
    props.set_online_fetching(
        ValidationContexts::all().with_sources(&[CertificateSource::OcspIssuer]),
        OnlineFetching::NeverFetch,
    );
    props
        .defaults_mut()
        .set_evidence_preference(RevocationEvidencePreference::PreferCrl);
    let json = serde_json::to_vec(&props).unwrap();
    let back: SignatureValidationProperties = serde_json::from_slice(&json).unwrap();
    assert_eq!(props, back);

    let minimal: SignatureValidationProperties = serde_json::from_str("{}").unwrap();
    assert_eq!(SignatureValidationProperties::default(), minimal);

    assert_eq!(
        SignatureValidationProperties::default(),
        read_properties(&None).unwrap()
    );
}

#[test]
fn test_pp_accessors() {
    let mut pp = PolicyProperties::new();
    assert_eq!(None, pp.get_continue_after_failure());
    pp.set_continue_after_failure(false).set_freshness(5);
    assert_eq!(Some(false), pp.get_continue_after_failure());
    assert_eq!(Some(5), pp.get_freshness());
    pp.clear_freshness();
    assert_eq!(None, pp.get_freshness());
}
