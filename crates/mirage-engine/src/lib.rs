use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use mirage_contracts::credential::ApiKey;
use mirage_contracts::error::{MirageError, Result};
use mirage_contracts::modes::{ModeCatalog, OutputKind};
use mirage_contracts::request::{build_request, merge_image_url, GenerationForm, StagedImage};
use mirage_contracts::result::{normalize_response, ResultRecord, SessionHistory};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const DEFAULT_API_BASE: &str = "https://fal.run";
const DEFAULT_STORAGE_BASE: &str = "https://rest.alpha.fal.ai";

#[derive(Clone)]
pub struct MediaBytes {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub trait Transport: Send + Sync {
    fn invoke(&self, model_id: &str, payload: &Map<String, Value>, key: &ApiKey) -> Result<Value>;
    fn upload(&self, data: &[u8], content_type: &str, key: &ApiKey) -> Result<String>;
    fn fetch(&self, url: &str) -> Result<MediaBytes>;
}

pub struct HttpTransport {
    api_base: String,
    storage_base: String,
    http: HttpClient,
    invoke_timeout_s: f64,
    upload_timeout_s: f64,
    download_timeout_s: f64,
}

impl HttpTransport {
    pub fn from_env() -> Self {
        Self {
            api_base: base_url_env("FAL_API_BASE", DEFAULT_API_BASE),
            storage_base: base_url_env("FAL_STORAGE_BASE", DEFAULT_STORAGE_BASE),
            http: HttpClient::new(),
            invoke_timeout_s: env_timeout_seconds("MIRAGE_INVOKE_TIMEOUT", 600.0, 15.0, 3600.0),
            upload_timeout_s: env_timeout_seconds("MIRAGE_UPLOAD_TIMEOUT", 120.0, 15.0, 600.0),
            download_timeout_s: env_timeout_seconds("MIRAGE_DOWNLOAD_TIMEOUT", 120.0, 15.0, 600.0),
        }
    }
}

impl Transport for HttpTransport {
    fn invoke(&self, model_id: &str, payload: &Map<String, Value>, key: &ApiKey) -> Result<Value> {
        let endpoint = format!("{}/{}", self.api_base, model_id.trim_start_matches('/'));
        let response = self
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, key.header_value())
            .timeout(Duration::from_secs_f64(self.invoke_timeout_s))
            .json(&Value::Object(payload.clone()))
            .send()
            .map_err(|err| MirageError::remote(format!("request to {endpoint} failed: {err}")))?;
        response_json_or_error(&endpoint, response)
    }

    fn upload(&self, data: &[u8], content_type: &str, key: &ApiKey) -> Result<String> {
        let endpoint = format!("{}/storage/upload", self.storage_base);
        let response = self
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, key.header_value())
            .header(CONTENT_TYPE, content_type)
            .timeout(Duration::from_secs_f64(self.upload_timeout_s))
            .body(data.to_vec())
            .send()
            .map_err(|err| MirageError::upload(format!("storage upload failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().unwrap_or_default();
            return Err(MirageError::upload(format!(
                "storage upload returned {code}: {}",
                truncate_text(&body, 512)
            )));
        }
        let payload: Value = response
            .json()
            .map_err(|_| MirageError::upload("storage endpoint returned a non-JSON body"))?;
        payload
            .get("access_url")
            .or_else(|| payload.get("url"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| MirageError::upload("storage endpoint returned no URL"))
    }

    fn fetch(&self, url: &str) -> Result<MediaBytes> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs_f64(self.download_timeout_s))
            .send()
            .map_err(|err| MirageError::download(format!("fetching {url} failed: {err}")))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(MirageError::download(format!(
                "{url} returned {code}: {}",
                truncate_text(&body, 512)
            )));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|err| {
                MirageError::download(format!("reading bytes from {url} failed: {err}"))
            })?
            .to_vec();
        Ok(MediaBytes { bytes, content_type })
    }
}

pub fn resolve_image(
    staged: &StagedImage,
    key: &ApiKey,
    transport: &dyn Transport,
) -> Result<String> {
    let direct = staged
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    if let Some(url) = direct {
        return Ok(url.to_string());
    }
    if let Some(bytes) = staged.bytes.as_ref() {
        let content_type = content_type_or_sniff(&bytes.data, &bytes.content_type);
        let url = transport.upload(&bytes.data, &content_type, key)?;
        tracing::debug!("staged {} bytes as {url}", bytes.data.len());
        return Ok(url);
    }
    Err(MirageError::validation("no image staged"))
}

pub fn inline_data_url(data: &[u8], content_type: &str) -> String {
    format!("data:{content_type};base64,{}", BASE64.encode(data))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn content_type_or_sniff(data: &[u8], declared: &str) -> String {
    let declared = declared.trim();
    if !declared.is_empty() {
        return declared.to_string();
    }
    image::guess_format(data)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

pub struct Session {
    id: String,
    catalog: ModeCatalog,
    default_key: Option<String>,
    staged: StagedImage,
    history: SessionHistory,
    transport: Box<dyn Transport>,
}

impl Session {
    pub fn from_env() -> Self {
        Self::new(Box::new(HttpTransport::from_env()), env_api_key())
    }

    pub fn new(transport: Box<dyn Transport>, default_key: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            catalog: ModeCatalog::default(),
            default_key,
            staged: StagedImage::none(),
            history: SessionHistory::new(),
            transport,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn catalog(&self) -> &ModeCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn staged_image(&self) -> &StagedImage {
        &self.staged
    }

    pub fn stage_image_url(&mut self, url: impl Into<String>) {
        self.staged.set_url(url);
    }

    pub fn stage_image_bytes(&mut self, data: Vec<u8>, content_type: impl Into<String>) {
        self.staged.set_bytes(data, content_type);
    }

    pub fn clear_staged_image(&mut self) {
        self.staged.clear();
    }

    pub fn generate(&mut self, mode_name: &str, form: &GenerationForm) -> Result<ResultRecord> {
        let key = self.resolve_key(form)?;
        let mode = self
            .catalog
            .get(mode_name)
            .ok_or_else(|| {
                MirageError::validation(format!(
                    "unknown mode {mode_name:?}, expected one of: {}",
                    self.catalog.names().join(", ")
                ))
            })?
            .clone();

        let mut payload = build_request(&mode, form, &self.staged)?;
        if mode.requires_image() {
            let image_url = resolve_image(&self.staged, &key, self.transport.as_ref())?;
            merge_image_url(&mut payload, &image_url);
        }

        let payload_preview = Value::Object(payload.clone());
        tracing::debug!("sending {} to {}: {payload_preview}", mode.name, mode.model_id);
        let started = Instant::now();
        let response = self.transport.invoke(&mode.model_id, &payload, &key)?;
        let record = normalize_response(&mode, &response, form.prompt.trim())?;
        tracing::info!(
            "{} finished in {:.1}s ({})",
            mode.name,
            started.elapsed().as_secs_f64(),
            record.url
        );

        self.history.prepend(record.clone());
        Ok(record)
    }

    pub fn download(&self, index: usize, out_dir: &Path) -> Result<PathBuf> {
        let record = self.history.get(index).ok_or_else(|| {
            MirageError::validation(format!(
                "no result at index {index}, history holds {}",
                self.history.len()
            ))
        })?;
        download_record(record, self.transport.as_ref(), out_dir)
    }

    fn resolve_key(&self, form: &GenerationForm) -> Result<ApiKey> {
        let raw = form
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_key.clone());
        match raw {
            Some(raw) => ApiKey::parse(&raw),
            None => Err(MirageError::validation(
                "no API key: pass one with the submission or set FAL_KEY",
            )),
        }
    }
}

pub fn download_record(
    record: &ResultRecord,
    transport: &dyn Transport,
    out_dir: &Path,
) -> Result<PathBuf> {
    let media = transport.fetch(&record.url)?;
    let ext = media_extension(media.content_type.as_deref(), record.kind);
    let file_name = format!(
        "wan-{}-{}.{ext}",
        record.mode,
        short_id(&record.prompt, &record.url)
    );
    let path = out_dir.join(file_name);
    fs::create_dir_all(out_dir)
        .and_then(|_| fs::write(&path, &media.bytes))
        .map_err(|err| MirageError::download(format!("failed writing {}: {err}", path.display())))?;
    tracing::debug!("saved {} ({} bytes)", path.display(), media.bytes.len());
    Ok(path)
}

fn media_extension(content_type: Option<&str>, kind: OutputKind) -> &'static str {
    if let Some(mime) = content_type {
        let lowered = mime.to_ascii_lowercase();
        if lowered.contains("mp4") {
            return "mp4";
        }
        if lowered.contains("webm") {
            return "webm";
        }
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        if lowered.contains("png") {
            return "png";
        }
    }
    match kind {
        OutputKind::Video => "mp4",
        OutputKind::Image => "png",
    }
}

fn short_id(prompt: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}

fn response_json_or_error(endpoint: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| MirageError::remote(format!("{endpoint} body read failed: {err}")))?;
    if !status.is_success() {
        return Err(MirageError::remote(format!(
            "{endpoint} returned {code}: {}",
            truncate_text(&body, 512)
        )));
    }
    serde_json::from_str(&body)
        .map_err(|_| MirageError::remote(format!("{endpoint} returned a non-JSON body")))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn base_url_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_timeout_seconds(key: &str, default: f64, min: f64, max: f64) -> f64 {
    let parsed = non_empty_env(key).and_then(|value| value.parse::<f64>().ok());
    parsed.unwrap_or(default).clamp(min, max)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_api_key() -> Option<String> {
    non_empty_env("FAL_KEY").or_else(|| non_empty_env("FAL_API_KEY"))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use mirage_contracts::error::MirageError;
    use mirage_contracts::modes::OutputKind;
    use mirage_contracts::request::{GenerationForm, StagedBytes, StagedImage};
    use serde_json::{json, Map, Value};

    use super::{
        content_type_or_sniff, download_record, inline_data_url, media_extension, resolve_image,
        short_id, MediaBytes, Result, Session, Transport,
    };

    const TEST_KEY: &str = "key_id:key_secret";

    #[derive(Default)]
    struct FakeInner {
        responses: Mutex<VecDeque<Result<Value>>>,
        invoked: Mutex<Vec<(String, Map<String, Value>)>>,
        uploaded: Mutex<Vec<(usize, String)>>,
        upload_result: Option<Result<String>>,
        fetched: Mutex<Vec<String>>,
        fetch_result: Option<Result<MediaBytes>>,
    }

    #[derive(Clone, Default)]
    struct FakeTransport(Arc<FakeInner>);

    impl FakeTransport {
        fn scripted(responses: Vec<Result<Value>>) -> Self {
            let fake = Self::default();
            *fake.0.responses.lock().unwrap() = responses.into();
            fake
        }

        fn with_upload(self, result: Result<String>) -> Self {
            let mut inner = Arc::try_unwrap(self.0).ok().expect("unshared fake");
            inner.upload_result = Some(result);
            Self(Arc::new(inner))
        }

        fn with_fetch(self, result: Result<MediaBytes>) -> Self {
            let mut inner = Arc::try_unwrap(self.0).ok().expect("unshared fake");
            inner.fetch_result = Some(result);
            Self(Arc::new(inner))
        }

        fn invoked(&self) -> Vec<(String, Map<String, Value>)> {
            self.0.invoked.lock().unwrap().clone()
        }

        fn uploads(&self) -> Vec<(usize, String)> {
            self.0.uploaded.lock().unwrap().clone()
        }

        fn fetches(&self) -> Vec<String> {
            self.0.fetched.lock().unwrap().clone()
        }
    }

    impl Transport for FakeTransport {
        fn invoke(
            &self,
            model_id: &str,
            payload: &Map<String, Value>,
            _key: &super::ApiKey,
        ) -> Result<Value> {
            self.0
                .invoked
                .lock()
                .unwrap()
                .push((model_id.to_string(), payload.clone()));
            self.0
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(MirageError::remote("no scripted response")))
        }

        fn upload(&self, data: &[u8], content_type: &str, _key: &super::ApiKey) -> Result<String> {
            self.0
                .uploaded
                .lock()
                .unwrap()
                .push((data.len(), content_type.to_string()));
            self.0
                .upload_result
                .clone()
                .unwrap_or_else(|| Ok("https://storage.example/u/1.png".to_string()))
        }

        fn fetch(&self, url: &str) -> Result<MediaBytes> {
            self.0.fetched.lock().unwrap().push(url.to_string());
            self.0.fetch_result.clone().unwrap_or_else(|| {
                Ok(MediaBytes {
                    bytes: b"media".to_vec(),
                    content_type: Some("video/mp4".to_string()),
                })
            })
        }
    }

    fn video_response(url: &str, seed: i64) -> Result<Value> {
        Ok(json!({"video": {"url": url}, "seed": seed, "actual_prompt": "expanded"}))
    }

    fn form(prompt: &str) -> GenerationForm {
        GenerationForm {
            prompt: prompt.to_string(),
            api_key: Some(TEST_KEY.to_string()),
            ..GenerationForm::default()
        }
    }

    fn png_magic() -> Vec<u8> {
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
    }

    #[test]
    fn pipeline_normalizes_and_prepends_history() {
        let fake = FakeTransport::scripted(vec![
            video_response("https://x/a.mp4", 7),
            video_response("https://x/b.mp4", 8),
        ]);
        let mut session = Session::new(Box::new(fake.clone()), None);

        let first = session.generate("text-to-video", &form("P1")).unwrap();
        assert_eq!(first.url, "https://x/a.mp4");
        assert_eq!(first.seed, Some(7));
        assert_eq!(first.prompt, "P1");
        assert_eq!(first.expanded_prompt.as_deref(), Some("expanded"));

        session.generate("text-to-video", &form("P2")).unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().latest().unwrap().url, "https://x/b.mp4");

        let invoked = fake.invoked();
        assert_eq!(invoked.len(), 2);
        assert_eq!(invoked[0].0, "fal-ai/wan-25-preview/text-to-video");
        assert_eq!(
            invoked[0].1.get("enable_safety_checker"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn direct_url_skips_the_upload_path() {
        let fake = FakeTransport::scripted(vec![Ok(
            json!({"images": [{"url": "https://x/out.png"}], "seed": 3}),
        )]);
        let mut session = Session::new(Box::new(fake.clone()), None);
        // Both representations present at submission time; the URL wins.
        session.stage_image_bytes(vec![1, 2, 3], "image/png");
        session.stage_image_url("https://cdn.example/in.png");

        let record = session.generate("image-to-image", &form("restyle")).unwrap();
        assert_eq!(record.kind, OutputKind::Image);
        assert!(fake.uploads().is_empty());
        assert_eq!(
            fake.invoked()[0].1.get("image_url"),
            Some(&json!("https://cdn.example/in.png"))
        );
    }

    #[test]
    fn url_precedence_holds_even_with_both_set() {
        let fake = FakeTransport::default();
        let staged = StagedImage {
            url: Some("https://cdn.example/in.png".to_string()),
            bytes: Some(StagedBytes {
                data: vec![1, 2, 3],
                content_type: "image/png".to_string(),
            }),
        };
        let key = super::ApiKey::parse(TEST_KEY).unwrap();
        let url = resolve_image(&staged, &key, &fake).unwrap();
        assert_eq!(url, "https://cdn.example/in.png");
        assert!(fake.uploads().is_empty());
    }

    #[test]
    fn staged_bytes_are_uploaded_and_merged() {
        let fake = FakeTransport::scripted(vec![Ok(
            json!({"images": [{"url": "https://x/out.png"}]}),
        )]);
        let mut session = Session::new(Box::new(fake.clone()), None);
        session.stage_image_bytes(vec![0; 16], "image/png");

        session.generate("image-to-image", &form("restyle")).unwrap();
        assert_eq!(fake.uploads(), vec![(16, "image/png".to_string())]);
        assert_eq!(
            fake.invoked()[0].1.get("image_url"),
            Some(&json!("https://storage.example/u/1.png"))
        );
    }

    #[test]
    fn undeclared_content_type_is_sniffed_before_upload() {
        let fake = FakeTransport::scripted(vec![Ok(
            json!({"images": [{"url": "https://x/out.png"}]}),
        )]);
        let mut session = Session::new(Box::new(fake.clone()), None);
        session.stage_image_bytes(png_magic(), "");

        session.generate("image-to-image", &form("restyle")).unwrap();
        assert_eq!(fake.uploads(), vec![(8, "image/png".to_string())]);
    }

    #[test]
    fn content_type_sniffing_prefers_the_declared_value() {
        assert_eq!(content_type_or_sniff(&png_magic(), ""), "image/png");
        assert_eq!(content_type_or_sniff(&png_magic(), " image/webp "), "image/webp");
        assert_eq!(
            content_type_or_sniff(b"not an image", ""),
            "application/octet-stream"
        );
    }

    #[test]
    fn upload_failure_stops_before_the_inference_call() {
        let fake =
            FakeTransport::default().with_upload(Err(MirageError::upload("storage said no")));
        let mut session = Session::new(Box::new(fake.clone()), None);
        session.stage_image_bytes(vec![0; 16], "image/png");

        let err = session
            .generate("image-to-image", &form("restyle"))
            .unwrap_err();
        assert!(matches!(err, MirageError::Upload(_)));
        assert!(fake.invoked().is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn remote_failure_leaves_the_session_usable() {
        let fake = FakeTransport::scripted(vec![
            Err(MirageError::remote("returned 503")),
            video_response("https://x/a.mp4", 1),
        ]);
        let mut session = Session::new(Box::new(fake.clone()), None);

        let err = session.generate("text-to-video", &form("P1")).unwrap_err();
        assert!(matches!(err, MirageError::Remote(_)));
        assert!(session.history().is_empty());

        session.generate("text-to-video", &form("P1")).unwrap();
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn malformed_response_is_not_stored() {
        let fake = FakeTransport::scripted(vec![Ok(json!({"video": {}}))]);
        let mut session = Session::new(Box::new(fake.clone()), None);

        let err = session.generate("text-to-video", &form("P1")).unwrap_err();
        assert!(matches!(err, MirageError::MalformedResponse(_)));
        assert!(session.history().is_empty());
    }

    #[test]
    fn missing_key_fails_before_any_network() {
        let fake = FakeTransport::default();
        let mut session = Session::new(Box::new(fake.clone()), None);
        let mut keyless = form("P1");
        keyless.api_key = None;

        let err = session.generate("text-to-video", &keyless).unwrap_err();
        assert!(err.is_validation());
        assert!(fake.invoked().is_empty());
        assert!(fake.uploads().is_empty());
    }

    #[test]
    fn malformed_key_fails_validation() {
        let fake = FakeTransport::default();
        let mut session = Session::new(Box::new(fake.clone()), None);
        let mut bad = form("P1");
        bad.api_key = Some("not-a-two-part-key".to_string());

        let err = session.generate("text-to-video", &bad).unwrap_err();
        assert!(err.is_validation());
        assert!(fake.invoked().is_empty());
    }

    #[test]
    fn session_default_key_backs_the_form() {
        let fake = FakeTransport::scripted(vec![video_response("https://x/a.mp4", 1)]);
        let mut session = Session::new(Box::new(fake.clone()), Some(TEST_KEY.to_string()));
        let mut keyless = form("P1");
        keyless.api_key = None;

        session.generate("text-to-video", &keyless).unwrap();
        assert_eq!(fake.invoked().len(), 1);
    }

    #[test]
    fn unknown_mode_fails_validation() {
        let fake = FakeTransport::default();
        let mut session = Session::new(Box::new(fake.clone()), None);
        let err = session.generate("video-to-text", &form("P1")).unwrap_err();
        assert!(err.is_validation());
        assert!(fake.invoked().is_empty());
    }

    #[test]
    fn download_writes_the_asset_with_a_stable_name() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let fake = FakeTransport::scripted(vec![video_response("https://x/a.mp4", 7)]);
        let mut session = Session::new(Box::new(fake.clone()), None);
        session.generate("text-to-video", &form("P1"))?;

        let path = session.download(0, temp.path())?;
        assert_eq!(fake.fetches(), vec!["https://x/a.mp4".to_string()]);
        assert_eq!(std::fs::read(&path)?, b"media");
        let name = path.file_name().and_then(|value| value.to_str()).unwrap();
        assert_eq!(
            name,
            format!("wan-text-to-video-{}.mp4", short_id("P1", "https://x/a.mp4"))
        );
        Ok(())
    }

    #[test]
    fn download_failure_is_scoped_to_the_record() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let fake = FakeTransport::scripted(vec![video_response("https://x/a.mp4", 7)])
            .with_fetch(Err(MirageError::download("gone")));
        let mut session = Session::new(Box::new(fake.clone()), None);
        session.generate("text-to-video", &form("P1"))?;

        let err = session.download(0, temp.path()).unwrap_err();
        assert!(matches!(err, MirageError::Download(_)));
        assert_eq!(session.history().len(), 1);

        let err = session.download(5, temp.path()).unwrap_err();
        assert!(err.is_validation());
        Ok(())
    }

    #[test]
    fn download_extension_follows_the_content_type() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let fake = FakeTransport::default().with_fetch(Ok(MediaBytes {
            bytes: b"png".to_vec(),
            content_type: Some("image/png".to_string()),
        }));
        let record = mirage_contracts::result::ResultRecord {
            url: "https://x/a".to_string(),
            kind: OutputKind::Image,
            seed: None,
            prompt: "p".to_string(),
            expanded_prompt: None,
            mode: "text-to-image".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let path = download_record(&record, &fake, temp.path())?;
        assert!(path.to_string_lossy().ends_with(".png"));

        assert_eq!(media_extension(None, OutputKind::Video), "mp4");
        assert_eq!(media_extension(None, OutputKind::Image), "png");
        assert_eq!(media_extension(Some("video/webm"), OutputKind::Video), "webm");
        Ok(())
    }

    #[test]
    fn nothing_staged_is_a_validation_error() {
        let fake = FakeTransport::default();
        let key = super::ApiKey::parse(TEST_KEY).unwrap();
        let err = resolve_image(&StagedImage::none(), &key, &fake).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn inline_data_url_embeds_the_bytes() {
        let url = inline_data_url(&[1, 2, 3], "image/png");
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }
}
