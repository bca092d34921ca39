// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! The Graphite HBase server application and interface.
//!
//! The server is an [Axum](https://docs.rs/axum/latest/axum/) web application that serves the
//! Graphite metrics API over metrics stored in HBase: `/metrics/find` and `/metrics/expand`
//! search the metric tree, `/render` returns datapoints as JSON.

mod utils;

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use hyper::StatusCode;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use graphitedb::finder::node::Node;
use graphitedb::finder::FindQuery;
use graphitedb::utils::environment::load_env;
use graphitedb::utils::error::GraphiteDBError;
use graphitedb::utils::request::parse_time;
use graphitedb::GraphiteDB;

use crate::utils::error::ServerError;
use crate::utils::settings::Settings;
use crate::utils::shutdown::shutdown_signal;

const DEFAULT_FROM: &str = "-24h";
const DEFAULT_UNTIL: &str = "now";

/// Represents application state.
struct AppState {
  db: GraphiteDB,
  settings: Settings,
}

#[derive(Debug, Deserialize, Serialize)]
/// Represents a find or expand query.
struct MetricsQuery {
  query: Option<String>,
  from: Option<String>,
  until: Option<String>,
}

#[derive(Debug, Serialize)]
/// A node in Graphite's treejson format.
struct TreeNode {
  text: String,
  id: String,
  leaf: u8,
  #[serde(rename = "allowChildren")]
  allow_children: u8,
  expandable: u8,
}

impl From<&Node> for TreeNode {
  fn from(node: &Node) -> Self {
    let is_branch = u8::from(!node.is_leaf());
    TreeNode {
      text: node.get_name().to_owned(),
      id: node.get_path().to_owned(),
      leaf: u8::from(node.is_leaf()),
      allow_children: is_branch,
      expandable: is_branch,
    }
  }
}

#[derive(Debug, Serialize)]
/// One series in a render response.
struct RenderSeries {
  target: String,
  datapoints: Vec<(Option<f64>, u64)>,
}

type ErrorResponse = (StatusCode, Json<Value>);

/// Axum application for the server.
async fn app(config_dir_path: &str) -> Result<(Router, Arc<AppState>), ServerError> {
  // Read the settings from the config directory.
  let settings =
    Settings::new(config_dir_path).map_err(|e| ServerError::StartupError(e.to_string()))?;

  let db =
    GraphiteDB::new(config_dir_path).map_err(|e| ServerError::StartupError(e.to_string()))?;

  let shared_state = Arc::new(AppState { db, settings });

  let router: Router = Router::new()
    .route("/ping", get(ping))
    .route("/", get(ping))
    .route("/metrics/find", get(find_metrics))
    .route("/metrics/expand", get(expand_metrics))
    .route("/render", get(render))
    // ---
    // State that is passed to each request.
    .with_state(shared_state.clone())
    // ---
    // Layer for tracing in debug mode.
    .layer(TraceLayer::new_for_http());

  Ok((router, shared_state))
}

async fn run_server() -> Result<(), ServerError> {
  // Config directory path is relative to the current directory, and set in environment variable
  // "GRAPHITE_CONFIG_DIR_PATH". Defaults to "config" if not set.
  let config_dir_path =
    &env::var("GRAPHITE_CONFIG_DIR_PATH").unwrap_or_else(|_| "config".to_owned());

  let (app, shared_state) = app(config_dir_path).await?;

  // Start server.
  let port = shared_state.settings.get_server_settings().get_port();
  let host: &str = shared_state.settings.get_server_settings().get_host();
  let connection_string = &format!("{}:{}", host, port);
  let listener = TcpListener::bind(connection_string).await.map_err(|e| {
    ServerError::StartupError(format!("Could not listen using {}: {}", connection_string, e))
  })?;

  info!(
    "Starting Graphite HBase server on {}. Use Ctrl-C or SIGTERM to gracefully exit...",
    connection_string
  );

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ServerError::StartupError(e.to_string()))?;

  info!("Completed Graphite HBase server shutdown");
  Ok(())
}

/// Program entry point.
fn main() {
  // Load environment variables from ".env" and ".env-creds" file.
  load_env();

  // If log level isn't set, set it to info.
  if env::var("RUST_LOG").is_err() {
    env::set_var("RUST_LOG", "info")
  }

  // Set up logging.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  // Set the number of threads to be 1 less than the number of CPUs (or 1 if there are fewer than 2 CPUs).
  let num_threads = std::cmp::max(1, num_cpus::get().saturating_sub(1));

  let runtime = match tokio::runtime::Builder::new_multi_thread()
    .worker_threads(num_threads)
    .enable_all()
    .build()
  {
    Ok(runtime) => runtime,
    Err(e) => {
      error!("Could not create tokio runtime: {}", e);
      std::process::exit(1);
    }
  };

  if let Err(e) = runtime.block_on(run_server()) {
    error!("{}", e);
    std::process::exit(1);
  }
}

/// Build the JSON error body. User errors map to 400, everything else to 500.
fn error_response(e: &GraphiteDBError) -> ErrorResponse {
  let (status_code, error_type) = match e {
    GraphiteDBError::InvalidTimeRange(_)
    | GraphiteDBError::InvalidInterval(_, _)
    | GraphiteDBError::InvalidPattern(_) => (StatusCode::BAD_REQUEST, "bad_data"),
    _ => {
      error!("Request failed: {}", e);
      (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }
  };

  let response = json!({
      "status": "error",
      "errorType": error_type,
      "error": e.to_string(),
  });
  (status_code, Json(response))
}

fn bad_request(e: ServerError) -> ErrorResponse {
  let response = json!({
      "status": "error",
      "errorType": "bad_data",
      "error": e.to_string(),
  });
  (StatusCode::BAD_REQUEST, Json(response))
}

/// Get the non-empty `query` parameter.
fn get_query_pattern(metrics_query: &MetricsQuery) -> Result<&str, ErrorResponse> {
  match metrics_query.query.as_deref() {
    Some(query) if !query.is_empty() => Ok(query),
    _ => Err(bad_request(ServerError::InvalidInput(
      "No query provided".to_owned(),
    ))),
  }
}

/// Find the children matching a pattern, in treejson format.
async fn find_metrics(
  State(state): State<Arc<AppState>>,
  Query(metrics_query): Query<MetricsQuery>,
) -> Result<Json<Vec<TreeNode>>, ErrorResponse> {
  debug!("Finding metrics for HTTP query: {:?}", metrics_query);
  let pattern = get_query_pattern(&metrics_query)?;

  // Leaves are only filtered by time when the caller asks for a range.
  let now = Utc::now().timestamp() as u64;
  let (start_time, end_time) = match (&metrics_query.from, &metrics_query.until) {
    (None, None) => (None, None),
    (from, until) => {
      let from = parse_time(from.as_deref().unwrap_or(DEFAULT_FROM), now)
        .map_err(|e| error_response(&e))?;
      let until = parse_time(until.as_deref().unwrap_or(DEFAULT_UNTIL), now)
        .map_err(|e| error_response(&e))?;
      (Some(from), Some(until))
    }
  };

  let query = FindQuery::new(pattern, start_time, end_time);
  let nodes = state
    .db
    .find_nodes(&query)
    .await
    .map_err(|e| error_response(&e))?;

  Ok(Json(nodes.iter().map(TreeNode::from).collect()))
}

/// Expand a pattern to the paths of all matching nodes.
async fn expand_metrics(
  State(state): State<Arc<AppState>>,
  Query(metrics_query): Query<MetricsQuery>,
) -> Result<Json<Value>, ErrorResponse> {
  debug!("Expanding metrics for HTTP query: {:?}", metrics_query);
  let pattern = get_query_pattern(&metrics_query)?;

  let results = state
    .db
    .expand(pattern)
    .await
    .map_err(|e| error_response(&e))?;

  Ok(Json(json!({ "results": results })))
}

/// Render the datapoints of every target as JSON.
async fn render(
  State(state): State<Arc<AppState>>,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<RenderSeries>>, ErrorResponse> {
  debug!("Rendering for HTTP query: {:?}", params);

  let mut targets = Vec::new();
  let mut options: HashMap<&str, &str> = HashMap::new();
  for (key, value) in &params {
    if key == "target" {
      targets.push(value.as_str());
    } else {
      options.insert(key.as_str(), value.as_str());
    }
  }

  if targets.is_empty() {
    return Err(bad_request(ServerError::InvalidInput(
      "No target provided".to_owned(),
    )));
  }
  let format = options.get("format").copied().unwrap_or("json");
  if format != "json" {
    return Err(bad_request(ServerError::InvalidInput(format!(
      "Unsupported format {}",
      format
    ))));
  }

  let now = Utc::now().timestamp() as u64;
  let from = parse_time(options.get("from").copied().unwrap_or(DEFAULT_FROM), now)
    .map_err(|e| error_response(&e))?;
  let until = parse_time(options.get("until").copied().unwrap_or(DEFAULT_UNTIL), now)
    .map_err(|e| error_response(&e))?;

  let mut series_list = Vec::new();
  for target in targets {
    let fetched = state
      .db
      .fetch_at(target, from, until, now)
      .await
      .map_err(|e| error_response(&e))?;

    series_list.extend(fetched.into_iter().map(|(path, series)| RenderSeries {
      target: path,
      datapoints: series.get_datapoints(),
    }));
  }

  Ok(Json(series_list))
}

/// Ping to check if the server is up.
async fn ping(State(_state): State<Arc<AppState>>) -> String {
  "OK".to_owned()
}
