use crate::config::{HttpConfig, RtmConfig};
use crate::error::SyncError;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer};
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const REST_URL: &str = "https://api.rememberthemilk.com/services/rest/";
const AUTH_URL: &str = "https://www.rememberthemilk.com/services/auth/";

/// Client for the Remember The Milk REST convention: every method is a GET
/// against a single endpoint with `method`, `api_key`, `format=json` and an
/// `api_sig` parameter (md5 over the shared secret and the sorted key/value
/// concatenation).
pub struct RtmClient {
    client: Client,
    rest_url: String,
    auth_url: String,
    api_key: String,
    shared_secret: String,
    perms: String,
    token: Option<String>,
}

/// A task flattened out of RTM's list > taskseries > task hierarchy. The
/// completion mutation needs the full identifier triple, so the whole handle
/// is carried through the sync plan, not just the task id.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmTask {
    pub list_id: String,
    pub series_id: String,
    /// Doubles as the Habitica alias.
    pub task_id: String,
    pub name: String,
    pub due: Option<String>,
}

/// The interactive authorization step, injected so the flow is testable
/// headlessly. `confirm` returns once the user has granted access in the
/// browser (or fails on timeout/refusal).
pub trait AuthPrompt {
    fn confirm(&self, auth_url: &str) -> Result<(), SyncError>;
}

/// Default prompt: opens the authorization URL in a browser and waits for
/// Enter on stdin, bounded by the configured auth timeout.
pub struct BrowserPrompt {
    timeout: Duration,
}

impl BrowserPrompt {
    pub fn new(timeout_minutes: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_minutes.max(1) * 60),
        }
    }
}

impl AuthPrompt for BrowserPrompt {
    fn confirm(&self, auth_url: &str) -> Result<(), SyncError> {
        println!("› Authorize rtmhabit in your browser, then press Enter to continue:");
        println!("  {auth_url}");
        if open::that(auth_url).is_err() {
            println!("  (could not launch a browser; open the URL manually)");
        }

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            let result = io::stdin().lock().read_line(&mut line);
            let _ = tx.send(result.map(|_| ()));
        });
        match rx.recv_timeout(self.timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(SyncError::Io(err.to_string())),
            Err(_) => Err(SyncError::Auth(
                "authorization timed out; rerun to try again".to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    rsp: Rsp,
}

/// Union of the response payloads this program consumes; `stat` decides
/// whether the method-specific field is present.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Rsp {
    stat: String,
    err: Option<RspError>,
    frob: Option<String>,
    auth: Option<AuthPayload>,
    timeline: Option<String>,
    tasks: Option<TaskContainer>,
}

#[derive(Debug, Deserialize)]
struct RspError {
    code: String,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
struct TaskContainer {
    #[serde(default, deserialize_with = "one_or_many")]
    list: Vec<TaskList>,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    id: String,
    #[serde(default, deserialize_with = "one_or_many")]
    taskseries: Vec<TaskSeries>,
}

#[derive(Debug, Deserialize)]
struct TaskSeries {
    id: String,
    name: String,
    #[serde(default, deserialize_with = "one_or_many")]
    task: Vec<TaskInstance>,
}

#[derive(Debug, Deserialize)]
struct TaskInstance {
    id: String,
    #[serde(default)]
    due: String,
}

/// RTM's JSON collapses single-element collections to a bare object.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

impl Rsp {
    fn into_ok(self, method: &str) -> Result<Rsp, SyncError> {
        if self.stat == "ok" {
            return Ok(self);
        }
        let detail = self
            .err
            .map(|e| format!("{} (code {})", e.msg, e.code))
            .unwrap_or_else(|| "unknown error".to_string());
        Err(SyncError::Api(format!("{method} failed: {detail}")))
    }
}

fn sign(shared_secret: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut payload = String::from(shared_secret);
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }
    format!("{:x}", md5::compute(payload))
}

impl RtmClient {
    pub fn new(
        config: &RtmConfig,
        http: &HttpConfig,
        token: Option<String>,
    ) -> Result<Self, SyncError> {
        Self::with_base_urls(config, http, token, REST_URL, AUTH_URL)
    }

    pub fn with_base_urls(
        config: &RtmConfig,
        http: &HttpConfig,
        token: Option<String>,
        rest_url: &str,
        auth_url: &str,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds.max(5)))
            .build()
            .map_err(|e| SyncError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            rest_url: rest_url.to_string(),
            auth_url: auth_url.to_string(),
            api_key: config.api_key.clone(),
            shared_secret: config.shared_secret.clone(),
            perms: config.perms.clone(),
            token,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Rsp, SyncError> {
        let mut all: Vec<(String, String)> = vec![
            ("method".to_string(), method.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
            ("format".to_string(), "json".to_string()),
        ];
        if let Some(token) = &self.token {
            all.push(("auth_token".to_string(), token.clone()));
        }
        for (key, value) in params {
            all.push((key.to_string(), value.to_string()));
        }
        let sig = sign(&self.shared_secret, &all);
        all.push(("api_sig".to_string(), sig));

        let resp = self
            .client
            .get(&self.rest_url)
            .query(&all)
            .send()
            .map_err(|e| SyncError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SyncError::Request(format!(
                "{method} failed: HTTP {}",
                resp.status()
            )));
        }
        let envelope: Envelope = resp
            .json()
            .map_err(|e| SyncError::Api(format!("malformed response to {method}: {e}")))?;
        envelope.rsp.into_ok(method)
    }

    /// Validates the cached token. A definitive service-side rejection means
    /// the token is stale and the flow restarts; transport errors abort.
    pub fn check_token(&self) -> Result<bool, SyncError> {
        if self.token.is_none() {
            return Ok(false);
        }
        match self.call("rtm.auth.checkToken", &[]) {
            Ok(_) => Ok(true),
            Err(SyncError::Api(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn get_frob(&self) -> Result<String, SyncError> {
        let rsp = self.call("rtm.auth.getFrob", &[])?;
        rsp.frob
            .ok_or_else(|| SyncError::Api("rtm.auth.getFrob returned no frob".to_string()))
    }

    /// Signed desktop-flow authorization URL for the given frob.
    fn desktop_auth_url(&self, frob: &str) -> Result<String, SyncError> {
        let params = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("perms".to_string(), self.perms.clone()),
            ("frob".to_string(), frob.to_string()),
        ];
        let sig = sign(&self.shared_secret, &params);
        let mut with_sig = params;
        with_sig.push(("api_sig".to_string(), sig));
        let url = Url::parse_with_params(&self.auth_url, &with_sig)
            .map_err(|e| SyncError::Request(e.to_string()))?;
        Ok(url.to_string())
    }

    fn get_token(&self, frob: &str) -> Result<String, SyncError> {
        let rsp = self.call("rtm.auth.getToken", &[("frob", frob)])?;
        rsp.auth
            .map(|auth| auth.token)
            .ok_or_else(|| SyncError::Api("rtm.auth.getToken returned no token".to_string()))
    }

    /// Ensures a valid auth token, running the interactive desktop flow when
    /// the cached one is missing or stale. Returns true when a fresh token
    /// was obtained (the caller persists it right away).
    pub fn ensure_token(&mut self, prompt: &dyn AuthPrompt) -> Result<bool, SyncError> {
        if self.check_token()? {
            return Ok(false);
        }
        self.token = None;
        let frob = self.get_frob()?;
        let url = self.desktop_auth_url(&frob)?;
        prompt.confirm(&url)?;
        let token = self.get_token(&frob)?;
        self.token = Some(token);
        Ok(true)
    }

    /// Timelines scope mutating calls; one per run is enough.
    pub fn create_timeline(&self) -> Result<String, SyncError> {
        let rsp = self.call("rtm.timelines.create", &[])?;
        rsp.timeline
            .ok_or_else(|| SyncError::Api("rtm.timelines.create returned no timeline".to_string()))
    }

    /// Fetches tasks matching the filter, optionally scoped to changes since
    /// the last sync, flattened out of RTM's nested hierarchy.
    pub fn get_tasks(
        &self,
        filter: &str,
        last_sync: Option<&str>,
    ) -> Result<Vec<RtmTask>, SyncError> {
        let mut params = vec![("filter", filter)];
        if let Some(since) = last_sync {
            params.push(("last_sync", since));
        }
        let rsp = self.call("rtm.tasks.getList", &params)?;
        Ok(flatten_tasks(rsp.tasks.unwrap_or_default()))
    }

    pub fn complete_task(&self, timeline: &str, task: &RtmTask) -> Result<(), SyncError> {
        self.call(
            "rtm.tasks.complete",
            &[
                ("timeline", timeline),
                ("list_id", &task.list_id),
                ("taskseries_id", &task.series_id),
                ("task_id", &task.task_id),
            ],
        )?;
        Ok(())
    }
}

fn flatten_tasks(container: TaskContainer) -> Vec<RtmTask> {
    let mut tasks = Vec::new();
    for list in container.list {
        for series in list.taskseries {
            let Some(instance) = series.task.first() else {
                continue;
            };
            let due = if instance.due.is_empty() {
                None
            } else {
                Some(instance.due.clone())
            };
            tasks.push(RtmTask {
                list_id: list.id.clone(),
                series_id: series.id,
                task_id: instance.id.clone(),
                name: series.name,
                due,
            });
        }
    }
    tasks
}
