//! Scripted `PagesTransport` shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pagepush_pages_client::{ClientError, ErrorKind};
use pagepush_protocol::{AssetUploadEntry, Deployment, Manifest};

use crate::transport::{PagesTransport, TransportFuture};

pub(crate) const FAR_FUTURE: i64 = 4_102_444_800;

pub(crate) fn make_jwt(exp: i64, serial: usize) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
    let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"n":{serial}}}"#));
    format!("{header}.{body}.sig")
}

pub(crate) fn failure(kind: ErrorKind) -> ClientError {
    ClientError::new(kind, format!("scripted {kind} failure"))
}

#[derive(Default)]
pub(crate) struct MockTransport {
    /// Number of leading token fetches that return an already-expired JWT.
    pub expired_tokens: usize,
    pub token_delay: Duration,
    pub upload_delay: Duration,

    pub upload_script: Mutex<VecDeque<Result<(), ClientError>>>,
    pub upsert_script: Mutex<VecDeque<Result<(), ClientError>>>,
    pub deploy_script: Mutex<VecDeque<Result<Deployment, ClientError>>>,
    pub deploy_delay: Duration,

    pub token_fetches: AtomicUsize,
    pub uploads: Mutex<Vec<(String, Vec<String>)>>,
    pub upserts: Mutex<Vec<(String, Vec<String>)>>,
    pub deployments: Mutex<Vec<(Manifest, String)>>,

    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next `n` upload calls to fail with `kind`.
    pub fn fail_uploads(self, n: usize, kind: ErrorKind) -> Self {
        self.upload_script
            .lock()
            .unwrap()
            .extend((0..n).map(|_| Err(failure(kind))));
        self
    }

    pub fn fail_upserts(self, n: usize, kind: ErrorKind) -> Self {
        self.upsert_script
            .lock()
            .unwrap()
            .extend((0..n).map(|_| Err(failure(kind))));
        self
    }

    pub fn fail_deployments(self, n: usize, kind: ErrorKind) -> Self {
        self.deploy_script
            .lock()
            .unwrap()
            .extend((0..n).map(|_| Err(failure(kind))));
        self
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn deployment_calls(&self) -> usize {
        self.deployments.lock().unwrap().len()
    }

    pub fn token_fetch_count(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }
}

impl PagesTransport for MockTransport {
    fn fetch_upload_token(&self) -> TransportFuture<'_, String> {
        Box::pin(async move {
            if !self.token_delay.is_zero() {
                tokio::time::sleep(self.token_delay).await;
            }
            let serial = self.token_fetches.fetch_add(1, Ordering::SeqCst);
            let exp = if serial < self.expired_tokens { 1 } else { FAR_FUTURE };
            Ok(make_jwt(exp, serial))
        })
    }

    fn upload_assets<'a>(
        &'a self,
        jwt: &'a str,
        entries: &'a [AssetUploadEntry],
    ) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.upload_delay.is_zero() {
                tokio::time::sleep(self.upload_delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.uploads.lock().unwrap().push((
                jwt.to_string(),
                entries.iter().map(|e| e.key.clone()).collect(),
            ));
            self.upload_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        })
    }

    fn upsert_hashes<'a>(&'a self, jwt: &'a str, hashes: &'a [String]) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.upserts
                .lock()
                .unwrap()
                .push((jwt.to_string(), hashes.to_vec()));
            self.upsert_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        })
    }

    fn create_deployment<'a>(
        &'a self,
        manifest: &'a Manifest,
        branch: &'a str,
    ) -> TransportFuture<'a, Deployment> {
        Box::pin(async move {
            if !self.deploy_delay.is_zero() {
                tokio::time::sleep(self.deploy_delay).await;
            }
            self.deployments
                .lock()
                .unwrap()
                .push((manifest.clone(), branch.to_string()));
            self.deploy_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(Deployment {
                        id: "dep-1".into(),
                        url: "https://abc123.cdn.pages.dev".into(),
                        environment: None,
                    })
                })
        })
    }
}
