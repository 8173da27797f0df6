mod common;

use common::*;
use der::Encode;
use sigtrust::*;

const AIA_URI: &str = "http://ca.example/intermediate.cer";

#[test]
fn empty_chain_is_an_error() {
    let env = mock_env(vec![], vec![], SignatureValidationProperties::default());
    let retriever = IssuingCertificateRetriever::new(&env);
    assert_eq!(Err(Error::EmptyChain), retriever.complete_chain(&[]));
}

#[test]
fn completes_from_store() {
    let pki = TestPki::new();
    let env = mock_env(
        vec![pki.root.clone()],
        vec![pki.intermediate.clone()],
        SignatureValidationProperties::default(),
    );
    let retriever = IssuingCertificateRetriever::new(&env);

    let chain = retriever.complete_chain(&[pki.signer.clone()]).unwrap();
    assert_eq!(vec![pki.signer.clone(), pki.intermediate.clone(), pki.root.clone()], chain);

    // a self-signed leaf is already complete
    let chain = retriever.complete_chain(&[pki.root.clone()]).unwrap();
    assert_eq!(vec![pki.root.clone()], chain);
}

#[test]
fn presented_certificates_are_used_first() {
    let pki = TestPki::new();
    let env = mock_env(
        vec![pki.root.clone()],
        vec![],
        SignatureValidationProperties::default(),
    );
    let retriever = IssuingCertificateRetriever::new(&env);

    let chain = retriever
        .complete_chain(&[pki.signer.clone(), pki.intermediate.clone()])
        .unwrap();
    assert_eq!(vec![pki.signer, pki.intermediate, pki.root], chain);
}

#[test]
fn unlinked_presented_certificates_are_kept() {
    let pki = TestPki::new();
    let unrelated = CertBuilder::new("CN=Unrelated,O=Elsewhere", 50).build();
    let env = mock_env(
        vec![pki.root.clone()],
        vec![pki.intermediate.clone()],
        SignatureValidationProperties::default(),
    );
    let retriever = IssuingCertificateRetriever::new(&env);

    let chain = retriever
        .complete_chain(&[pki.signer.clone(), unrelated.clone()])
        .unwrap();
    assert_eq!(4, chain.len());
    assert_eq!(pki.root, chain[2]);
    assert_eq!(unrelated, chain[3]);
}

#[test]
fn incomplete_chain_when_issuer_is_unavailable() {
    let pki = TestPki::new();
    let env = mock_env(vec![], vec![], SignatureValidationProperties::default());
    let retriever = IssuingCertificateRetriever::new(&env);

    let chain = retriever.complete_chain(&[pki.signer.clone()]).unwrap();
    assert_eq!(vec![pki.signer.clone()], chain);
    assert!(retriever.issuer_of(&pki.signer).is_none());
}

#[test]
fn issuer_loop_terminates() {
    let a0 = CertBuilder::new("CN=Loop A", 30).build();
    let b = CertBuilder::new("CN=Loop B", 31).issued_by(&a0).build();
    let a = CertBuilder::new("CN=Loop A", 30).issued_by(&b).build();
    let env = mock_env(
        vec![],
        vec![a.clone(), b.clone()],
        SignatureValidationProperties::default(),
    );
    let retriever = IssuingCertificateRetriever::new(&env);

    let chain = retriever.complete_chain(&[a.clone()]).unwrap();
    assert_eq!(vec![a, b], chain);
}

#[test]
fn aia_issuers_are_fetched_once() {
    let pki = TestPki::new();
    let signer = CertBuilder::new("CN=Test Signer,O=Example", 3)
        .issued_by(&pki.intermediate)
        .extension(ca_issuers_ext(AIA_URI))
        .build();
    let fetcher = MockFetcher {
        uri: AIA_URI.to_string(),
        bytes: pki.intermediate.to_der().unwrap(),
        ..Default::default()
    };
    let mut env = mock_env(
        vec![pki.root.clone()],
        vec![],
        SignatureValidationProperties::default(),
    );
    env.set_issuer_fetcher(Box::new(fetcher.clone()));
    let retriever = IssuingCertificateRetriever::new(&env);

    let chain = retriever.complete_chain(&[signer.clone()]).unwrap();
    assert_eq!(vec![signer.clone(), pki.intermediate.clone(), pki.root.clone()], chain);
    assert_eq!(1, fetcher.count());
    assert_eq!(1, env.issuer_cache().len());

    // served from the cache
    let chain = retriever.complete_chain(&[signer]).unwrap();
    assert_eq!(3, chain.len());
    assert_eq!(1, fetcher.count());
}

#[test]
fn fetch_failure_yields_no_issuer() {
    let pki = TestPki::new();
    let signer = CertBuilder::new("CN=Test Signer,O=Example", 3)
        .issued_by(&pki.intermediate)
        .extension(ca_issuers_ext("http://ca.example/missing.cer"))
        .build();
    let fetcher = MockFetcher {
        uri: AIA_URI.to_string(),
        bytes: pki.intermediate.to_der().unwrap(),
        ..Default::default()
    };
    let mut env = mock_env(vec![], vec![], SignatureValidationProperties::default());
    env.set_issuer_fetcher(Box::new(fetcher.clone()));
    let retriever = IssuingCertificateRetriever::new(&env);

    assert!(retriever.issuer_of(&signer).is_none());
    assert_eq!(1, fetcher.count());
    assert!(env.issuer_cache().is_empty());
}

#[test]
fn candidate_order() {
    let pki = TestPki::new();
    let signer = CertBuilder::new("CN=Test Signer,O=Example", 3)
        .issued_by(&pki.intermediate)
        .extension(ca_issuers_ext(AIA_URI))
        .build();
    // same subject as the intermediate, different keys
    let trusted_twin = CertBuilder::new("CN=Test Intermediate CA,O=Example", 21)
        .issued_by(&pki.root)
        .build();
    let known_twin = CertBuilder::new("CN=Test Intermediate CA,O=Example", 22)
        .issued_by(&pki.root)
        .build();
    let fetcher = MockFetcher {
        uri: AIA_URI.to_string(),
        bytes: pki.intermediate.to_der().unwrap(),
        ..Default::default()
    };
    let mut env = mock_env(
        vec![trusted_twin.clone()],
        vec![known_twin.clone()],
        SignatureValidationProperties::default(),
    );
    env.set_issuer_fetcher(Box::new(fetcher));
    let retriever = IssuingCertificateRetriever::new(&env);

    let candidates = retriever.issuer_candidates(&signer);
    assert_eq!(
        vec![pki.intermediate.clone(), trusted_twin, known_twin],
        candidates
    );
    assert_eq!(Some(pki.intermediate), retriever.issuer_of(&signer));
}

#[test]
fn crl_issuer_chain_from_store() {
    let pki = TestPki::new();
    let env = mock_env(
        vec![pki.root.clone()],
        vec![pki.intermediate.clone()],
        SignatureValidationProperties::default(),
    );
    let retriever = IssuingCertificateRetriever::new(&env);

    let crl = CrlBuilder::new(&pki.intermediate).build();
    assert_eq!(
        vec![pki.intermediate.clone(), pki.root.clone()],
        retriever.crl_issuer_chain(&crl)
    );

    // named for the intermediate but signed with another key
    let forged = CrlBuilder::new(&pki.intermediate).signed_by(&pki.signer).build();
    assert!(retriever.crl_issuer_chain(&forged).is_empty());
}
