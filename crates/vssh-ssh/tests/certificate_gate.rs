// ABOUTME: Integration tests for the certificate gate using real minted certificates.
// ABOUTME: A scripted Vault session counts sign calls to prove reuse and renewal.

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use ssh_key::certificate::{Builder, CertType};
use ssh_key::{Algorithm, LineEnding, PrivateKey};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use vssh_config::{Config, UserConfig};
use vssh_ssh::{unix_now, CertificateManager, SignedCertificate, SshError};
use vssh_vault::{OidcChallenge, SessionToken, VaultError, VaultSession};

/// Mint an OpenSSH user certificate valid between the given unix times.
fn mint_certificate(valid_after: u64, valid_before: u64) -> String {
    let mut rng = rand::thread_rng();
    let ca = PrivateKey::random(&mut rng, Algorithm::Ed25519).expect("CA key");
    let user = PrivateKey::random(&mut rng, Algorithm::Ed25519).expect("user key");

    let mut builder = Builder::new_with_random_nonce(
        &mut rng,
        user.public_key().key_data().clone(),
        valid_after,
        valid_before,
    )
    .expect("certificate builder");
    builder.serial(1).expect("serial");
    builder.key_id("vault-test").expect("key id");
    builder.cert_type(CertType::User).expect("cert type");
    builder.valid_principal("alice").expect("principal");

    builder
        .sign(&ca)
        .expect("sign certificate")
        .to_openssh()
        .expect("encode certificate")
}

fn fresh_certificate() -> String {
    let now = unix_now();
    mint_certificate(now - 60, now + 4 * 3600)
}

/// Write a key pair at `<dir>/<file>` and `<dir>/<file>.pub`.
fn write_key_pair(dir: &Path, file: &str) -> PathBuf {
    let key = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519).expect("key");
    let private = dir.join(file);
    std::fs::write(&private, key.to_openssh(LineEnding::LF).expect("encode").as_bytes())
        .expect("write private key");
    std::fs::write(
        dir.join(format!("{file}.pub")),
        key.public_key().to_openssh().expect("encode public"),
    )
    .expect("write public key");
    private
}

#[derive(Debug, Clone, PartialEq)]
struct SignRequest {
    mount: String,
    role: String,
    public_key: String,
    ttl: Duration,
}

/// Session whose sign call returns a fixed certificate or fails.
struct SigningSession {
    certificate: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SignRequest>>,
}

impl SigningSession {
    fn returning(certificate: String) -> Self {
        Self {
            certificate: Some(certificate),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            certificate: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<SignRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VaultSession for SigningSession {
    fn token(&self) -> Option<&SessionToken> {
        None
    }

    fn set_token(&mut self, _token: SessionToken) {}

    async fn is_token_valid(&self) -> bool {
        true
    }

    async fn sign(
        &self,
        mount: &str,
        role: &str,
        public_key: &str,
        ttl: Duration,
    ) -> vssh_vault::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(SignRequest {
            mount: mount.to_string(),
            role: role.to_string(),
            public_key: public_key.to_string(),
            ttl,
        });
        self.certificate.clone().ok_or(VaultError::Api {
            path: format!("{mount}/sign/{role}"),
            status: 400,
            message: format!("unknown role: {role}"),
        })
    }

    async fn login(&self, _: &str, _: &str, _: Value) -> vssh_vault::Result<SessionToken> {
        unreachable!("certificate gate never logs in")
    }

    async fn oidc_auth_url(&self, _: &str, _: &str, _: &str) -> vssh_vault::Result<OidcChallenge> {
        unreachable!("certificate gate never starts OIDC")
    }

    async fn oidc_callback(
        &self,
        _: &str,
        _: &str,
        _: Option<&str>,
    ) -> vssh_vault::Result<SessionToken> {
        unreachable!("certificate gate never completes OIDC")
    }
}

/// Config with keys in `dir`, `alice` mapped to her own key and role.
fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.ssh.key_directory = dir.display().to_string();
    config.ssh.certificate_ttl = Duration::from_secs(4 * 3600);
    config.users.insert(
        "alice".to_string(),
        UserConfig {
            private_key: dir.join("alice_ed25519").display().to_string(),
            vault_role: Some("ops-role".to_string()),
        },
    );
    config
}

#[tokio::test]
async fn valid_cached_certificate_skips_signing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_in(temp_dir.path());
    let session = SigningSession::returning(fresh_certificate());
    let manager = CertificateManager::new(&session, &config);

    let cached = fresh_certificate();
    let cert_path = manager.certificate_path("alice");
    std::fs::write(&cert_path, &cached).unwrap();

    let identity = manager.identity("alice").unwrap();
    let path = manager.ensure_certificate(&identity).await.unwrap();

    assert_eq!(path, cert_path);
    assert_eq!(session.calls(), 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), cached);
}

#[tokio::test]
async fn missing_certificate_is_signed_once_then_reused() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_in(temp_dir.path());
    write_key_pair(temp_dir.path(), "alice_ed25519");

    let signed = fresh_certificate();
    let session = SigningSession::returning(signed.clone());
    let manager = CertificateManager::new(&session, &config);
    let identity = manager.identity("alice").unwrap();

    let first = manager.ensure_certificate(&identity).await.unwrap();
    let second = manager.ensure_certificate(&identity).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(session.calls(), 1);
    assert_eq!(std::fs::read_to_string(&first).unwrap(), signed);
    assert!(manager.is_certificate_valid(&first));

    let saved = SignedCertificate::load(&first).unwrap();
    assert_eq!(saved.key_id(), "vault-test");
    assert_eq!(saved.principals(), ["alice".to_string()]);
}

#[tokio::test]
async fn stale_certificates_are_renewed() {
    let now = unix_now();
    let cases = [
        ("expiring in two minutes", mint_certificate(now - 3600, now + 120)),
        ("expired", mint_certificate(now - 7200, now - 3600)),
        ("not yet valid", mint_certificate(now + 3600, now + 7200)),
        (
            "bare public key",
            PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
                .unwrap()
                .public_key()
                .to_openssh()
                .unwrap(),
        ),
        ("garbage", "not a certificate".to_string()),
    ];

    for (label, stale) in cases {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = config_in(temp_dir.path());
        write_key_pair(temp_dir.path(), "alice_ed25519");

        let renewed = fresh_certificate();
        let session = SigningSession::returning(renewed.clone());
        let manager = CertificateManager::new(&session, &config);

        let cert_path = manager.certificate_path("alice");
        std::fs::write(&cert_path, &stale).unwrap();
        assert!(!manager.is_certificate_valid(&cert_path), "{label}");

        let identity = manager.identity("alice").unwrap();
        let path = manager.ensure_certificate(&identity).await.unwrap();

        assert_eq!(session.calls(), 1, "{label}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), renewed, "{label}");
    }
}

#[tokio::test]
async fn sign_request_uses_role_engine_ttl_and_public_key() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_in(temp_dir.path());
    let private = write_key_pair(temp_dir.path(), "alice_ed25519");
    let public_text = std::fs::read_to_string(vssh_ssh::public_key_path(&private)).unwrap();

    let session = SigningSession::returning(fresh_certificate());
    let manager = CertificateManager::new(&session, &config);
    let identity = manager.identity("alice").unwrap();
    manager.ensure_certificate(&identity).await.unwrap();

    let request = session.last_request().expect("one sign request");
    assert_eq!(
        request,
        SignRequest {
            mount: "ssh-client-signer".to_string(),
            role: "ops-role".to_string(),
            public_key: public_text.trim().to_string(),
            ttl: Duration::from_secs(4 * 3600),
        }
    );
}

#[tokio::test]
async fn unconfigured_identity_signs_with_its_own_name() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_in(temp_dir.path());
    write_key_pair(temp_dir.path(), "id_rsa");

    let session = SigningSession::returning(fresh_certificate());
    let manager = CertificateManager::new(&session, &config);
    let identity = manager.identity("bob").unwrap();
    let path = manager.ensure_certificate(&identity).await.unwrap();

    assert_eq!(path, temp_dir.path().join("vault_signed_bob.pub"));
    assert_eq!(session.last_request().unwrap().role, "bob");
}

#[tokio::test]
async fn missing_keys_fail_without_backend_call() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_in(temp_dir.path());
    let session = SigningSession::returning(fresh_certificate());
    let manager = CertificateManager::new(&session, &config);
    let identity = manager.identity("alice").unwrap();

    let err = manager.ensure_certificate(&identity).await.unwrap_err();
    match err {
        SshError::KeyNotFound { path } => {
            assert_eq!(path, temp_dir.path().join("alice_ed25519"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Private key present, public half missing.
    write_key_pair(temp_dir.path(), "alice_ed25519");
    std::fs::remove_file(temp_dir.path().join("alice_ed25519.pub")).unwrap();
    let err = manager.ensure_certificate(&identity).await.unwrap_err();
    match err {
        SshError::KeyNotFound { path } => {
            assert_eq!(path, temp_dir.path().join("alice_ed25519.pub"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(session.calls(), 0);
    assert!(!manager.certificate_path("alice").exists());
}

#[tokio::test]
async fn signing_failure_names_role() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_in(temp_dir.path());
    write_key_pair(temp_dir.path(), "alice_ed25519");

    let session = SigningSession::failing();
    let manager = CertificateManager::new(&session, &config);
    let identity = manager.identity("alice").unwrap();

    let err = manager.ensure_certificate(&identity).await.unwrap_err();
    match err {
        SshError::Sign { role, .. } => assert_eq!(role, "ops-role"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!manager.certificate_path("alice").exists());
}

#[tokio::test]
async fn missing_key_directory_is_created_private() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let key_dir = temp_dir.path().join("nested").join("ssh");
    let keys = temp_dir.path().join("keys");
    std::fs::create_dir(&keys).unwrap();
    write_key_pair(&keys, "alice_ed25519");

    let mut config = config_in(&keys);
    config.ssh.key_directory = key_dir.display().to_string();

    let session = SigningSession::returning(fresh_certificate());
    let manager = CertificateManager::new(&session, &config);
    let identity = manager.identity("alice").unwrap();
    let path = manager.ensure_certificate(&identity).await.unwrap();

    assert_eq!(path, key_dir.join("vault_signed_alice.pub"));
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&key_dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}

fn generated_name(rng: &mut impl Rng) -> String {
    const FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const REST: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789.-_";
    let len = rng.gen_range(1..16);
    let mut name = String::with_capacity(len);
    name.push(FIRST[rng.gen_range(0..FIRST.len())] as char);
    for _ in 1..len {
        name.push(REST[rng.gen_range(0..REST.len())] as char);
    }
    name
}

#[test]
fn certificate_naming_holds_for_generated_identities() {
    let config = config_in(Path::new("/srv/keys"));
    let session = SigningSession::failing();
    let manager = CertificateManager::new(&session, &config);
    let mut rng = rand::thread_rng();

    let mut names: Vec<String> = (0..200).map(|_| generated_name(&mut rng)).collect();
    names.extend(["first.last", "ops-team", "a.b-c.d"].map(String::from));

    for name in names {
        let path = manager.certificate_path(&name);
        assert_eq!(path.parent(), Some(Path::new("/srv/keys")), "{name}");
        assert_eq!(
            path.file_name().and_then(|f| f.to_str()),
            Some(format!("vault_signed_{name}.pub").as_str()),
            "{name}"
        );
        assert_eq!(manager.identity(&name).unwrap().name, name);
    }
}
