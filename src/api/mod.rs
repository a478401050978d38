mod config;
mod payload;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::advisory::{
    DEFINITION_NOT_FOUND, DISCLAIMER, RiskQuestionnaire, TaxSavingRequest, allocation_for_label,
    append_disclaimer, check_input, explain_allocation, glossary_terms, lookup_term,
    model_allocation, projection_notice, sanitize_output, score_risk, suggest_tax_saving_options,
};
use crate::core::{Result, SimulationError, simulate_with_cancel, solve_goal_with_cancel};

pub use config::{
    DEFAULT_GOAL_AMOUNT, DEFAULT_MAX_TRIAL_COUNT, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
    ServerConfig, default_max_workers,
};
use payload::{
    ErrorResponse, GlossaryEntry, GlossaryIndex, GlossaryQuery, GuardPayload, HealthResponse,
    PortfolioQuery, PortfolioResponse, RiskProfileResponse, SanitizedText, SimulatePayload,
    SimulateQuery, SimulateResponse, SolveGoalPayload, SolveGoalResponse, TaxSavingResponse,
    simulation_request_from_payload, solve_request_from_payload,
};

type AppState = Arc<ServerConfig>;

pub fn router(config: ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/solve-goal", post(solve_goal_handler))
        .route("/api/risk-profile", post(risk_profile_handler))
        .route("/api/portfolio", get(portfolio_handler))
        .route("/api/guard/input", post(guard_input_handler))
        .route("/api/guard/output", post(guard_output_handler))
        .route("/api/tax-saving", post(tax_saving_handler))
        .route("/api/glossary", get(glossary_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(config))
}

pub async fn run_http_server(config: ServerConfig) -> io::Result<()> {
    let listener = TcpListener::bind(config.socket_addr()).await?;
    serve(listener, config).await
}

/// Serves the API on an already bound listener.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        default_goal_amount = config.default_goal_amount,
        default_trial_count = config.default_trial_count,
        max_workers = config.max_workers,
        timeout_ms = config.request_timeout.as_millis() as u64,
        "nestegg HTTP API listening"
    );
    axum::serve(listener, router(config)).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn simulate_get_handler(
    State(config): State<AppState>,
    query: std::result::Result<Query<SimulateQuery>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(query)) => simulate_handler_impl(config, query.into()).await,
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None),
    }
}

async fn simulate_post_handler(
    State(config): State<AppState>,
    payload: std::result::Result<Json<SimulatePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => simulate_handler_impl(config, payload).await,
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None),
    }
}

async fn simulate_handler_impl(config: AppState, payload: SimulatePayload) -> Response {
    let request = match simulation_request_from_payload(payload, &config) {
        Ok(request) => request,
        Err(err) => return simulation_error_response(&err),
    };

    let goal_amount = request.params.goal_amount;
    let mode = request.schedule.mode;
    let duration_years = request.schedule.duration_years;
    let state = Arc::clone(&config);
    let projection = run_with_budget(&config, move |cancel| {
        simulate_with_cancel(&state.model, &request, cancel)
    })
    .await;

    match projection {
        Ok(projection) => json_response(
            StatusCode::OK,
            SimulateResponse {
                outcome: projection.outcome,
                goal_amount,
                mode,
                duration_years,
                portfolio: projection.portfolio,
                disclaimer: projection_notice(),
            },
        ),
        Err(err) => simulation_error_response(&err),
    }
}

async fn solve_goal_handler(
    State(config): State<AppState>,
    payload: std::result::Result<Json<SolveGoalPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None);
        }
    };
    let (request, solve) = match solve_request_from_payload(payload, &config) {
        Ok(parts) => parts,
        Err(err) => return simulation_error_response(&err),
    };

    let state = Arc::clone(&config);
    let result = run_with_budget(&config, move |cancel| {
        solve_goal_with_cancel(&state.model, &request, solve, cancel)
    })
    .await;

    match result {
        Ok(result) => json_response(
            StatusCode::OK,
            SolveGoalResponse {
                result,
                disclaimer: projection_notice(),
            },
        ),
        Err(err) => simulation_error_response(&err),
    }
}

async fn risk_profile_handler(
    payload: std::result::Result<Json<RiskQuestionnaire>, JsonRejection>,
) -> Response {
    let questionnaire = match payload {
        Ok(Json(questionnaire)) => questionnaire,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None);
        }
    };

    let profile = score_risk(&questionnaire);
    let allocation = model_allocation(profile.risk_category);
    let allocation_explanation = explain_allocation(&allocation, profile.risk_category.as_str());
    json_response(
        StatusCode::OK,
        RiskProfileResponse {
            profile,
            allocation,
            allocation_explanation,
        },
    )
}

async fn portfolio_handler(
    query: std::result::Result<Query<PortfolioQuery>, QueryRejection>,
) -> Response {
    let label = match query {
        Ok(Query(PortfolioQuery {
            risk_category: Some(label),
        })) if !label.trim().is_empty() => label,
        Ok(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid risk_category: is required",
                Some("risk_category"),
            );
        }
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None);
        }
    };

    let allocation = allocation_for_label(&label);
    let explanation = explain_allocation(&allocation, &label);
    json_response(
        StatusCode::OK,
        PortfolioResponse {
            risk_category: label,
            allocation,
            explanation,
        },
    )
}

async fn guard_input_handler(
    payload: std::result::Result<Json<GuardPayload>, JsonRejection>,
) -> Response {
    match guard_text(payload) {
        Ok(text) => json_response(StatusCode::OK, check_input(&text)),
        Err(response) => response,
    }
}

async fn guard_output_handler(
    payload: std::result::Result<Json<GuardPayload>, JsonRejection>,
) -> Response {
    match guard_text(payload) {
        Ok(text) => {
            let (sanitized, modified) = sanitize_output(&text);
            json_response(
                StatusCode::OK,
                SanitizedText {
                    text: append_disclaimer(&sanitized),
                    modified,
                },
            )
        }
        Err(response) => response,
    }
}

async fn tax_saving_handler(
    payload: std::result::Result<Json<TaxSavingRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None);
        }
    };

    match suggest_tax_saving_options(&request) {
        Ok(plan) => json_response(
            StatusCode::OK,
            TaxSavingResponse {
                plan,
                disclaimer: DISCLAIMER.to_string(),
            },
        ),
        Err(err) => simulation_error_response(&err),
    }
}

/// Looks up one term, or lists every known term when `term` is absent.
async fn glossary_handler(
    query: std::result::Result<Query<GlossaryQuery>, QueryRejection>,
) -> Response {
    let term = match query {
        Ok(Query(GlossaryQuery { term })) => term,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text(), None);
        }
    };

    match term {
        Some(term) if !term.trim().is_empty() => match lookup_term(&term) {
            Some(definition) => json_response(StatusCode::OK, GlossaryEntry { term, definition }),
            None => error_response(StatusCode::NOT_FOUND, DEFINITION_NOT_FOUND, Some("term")),
        },
        _ => json_response(
            StatusCode::OK,
            GlossaryIndex {
                terms: glossary_terms().collect(),
            },
        ),
    }
}

fn guard_text(
    payload: std::result::Result<Json<GuardPayload>, JsonRejection>,
) -> std::result::Result<String, Response> {
    match payload {
        Ok(Json(GuardPayload { text: Some(text) })) => Ok(text),
        Ok(_) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "invalid text: is required",
            Some("text"),
        )),
        Err(rejection) => Err(error_response(
            StatusCode::BAD_REQUEST,
            &rejection.body_text(),
            None,
        )),
    }
}

/// Runs `job` on the blocking pool within the configured time budget.
///
/// On expiry the cancel flag is raised so the workers stop at their next
/// batch boundary, and the caller gets [`SimulationError::Cancelled`].
async fn run_with_budget<T, F>(config: &ServerConfig, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Result<T> + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let task = tokio::task::spawn_blocking(move || job(&worker_cancel));

    match tokio::time::timeout(config.request_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(SimulationError::WorkerPool(join_error.to_string())),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            tracing::warn!(
                timeout_ms = config.request_timeout.as_millis() as u64,
                "simulation exceeded its time budget, cancelling"
            );
            Err(SimulationError::Cancelled)
        }
    }
}

fn simulation_error_response(err: &SimulationError) -> Response {
    let status = match err {
        SimulationError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        err if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "simulation request failed");
    } else {
        tracing::debug!(error = %err, "rejected simulation request");
    }
    error_response(status, &err.to_string(), err.field())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str, field: Option<&'static str>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            field,
        },
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Uri;
    use serde_json::{Value, json};

    use super::*;

    fn state(config: ServerConfig) -> State<AppState> {
        State(Arc::new(config))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    fn json_payload<T: serde::de::DeserializeOwned>(
        value: Value,
    ) -> std::result::Result<Json<T>, JsonRejection> {
        Ok(Json(serde_json::from_value(value).expect("payload should parse")))
    }

    #[tokio::test]
    async fn post_simulate_returns_outcome_portfolio_and_disclaimer() {
        let payload = json_payload(json!({
            "allocation": {"equity": 60, "debt": 30, "gold": 10},
            "investment": {"type": "sip", "monthlyAmount": 10000, "durationYears": 10},
            "simulationParams": {"numSimulations": 400, "goalAmount": 2000000, "seed": 42}
        }));
        let response = simulate_post_handler(state(ServerConfig::default()), payload).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );
        let body = body_json(response).await;
        assert_eq!(body["trialCount"], 400);
        assert_eq!(body["seed"], 42);
        assert_eq!(body["goalAmount"], 2_000_000.0);
        assert_eq!(body["mode"], "periodic");
        let worst = body["worstCase"].as_f64().expect("worstCase");
        let best = body["bestCase"].as_f64().expect("bestCase");
        assert!(worst <= best);
        let probability = body["probabilityOfGoalAchievement"]
            .as_f64()
            .expect("probability");
        assert!((0.0..=1.0).contains(&probability));
        let expected_return = body["portfolio"]["expectedReturn"].as_f64().expect("blend");
        assert!((expected_return - 0.101).abs() < 1e-9);
        assert!(body.get("trials").is_none());
        assert!(
            body["disclaimer"]
                .as_str()
                .expect("disclaimer")
                .contains("not guaranteed")
        );
    }

    #[tokio::test]
    async fn get_simulate_reads_flat_query() {
        let uri: Uri = "http://localhost/api/simulate?equity=100&type=lumpsum&lumpsumAmount=100000\
                        &durationYears=5&numSimulations=200&seed=9&includeTrials=true"
            .parse()
            .expect("valid uri");
        let query = Query::<SimulateQuery>::try_from_uri(&uri).expect("query should parse");
        let response = simulate_get_handler(state(ServerConfig::default()), Ok(query)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mode"], "lump_sum");
        assert_eq!(body["goalAmount"], DEFAULT_GOAL_AMOUNT);
        let trials = body["trials"].as_array().expect("trials requested");
        assert_eq!(trials.len(), 200);
    }

    #[tokio::test]
    async fn missing_amount_is_a_bad_request_naming_the_field() {
        let payload = json_payload(json!({
            "allocation": {"equity": 100},
            "investment": {"type": "sip", "durationYears": 5}
        }));
        let response = simulate_post_handler(state(ServerConfig::default()), payload).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["field"], "periodic_amount");
    }

    #[tokio::test]
    async fn zero_duration_is_a_bad_request() {
        let payload = json_payload(json!({
            "allocation": {"equity": 100},
            "investment": {"type": "lumpsum", "lumpsumAmount": 1000, "durationYears": 0}
        }));
        let response = simulate_post_handler(state(ServerConfig::default()), payload).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "duration_years");
    }

    #[tokio::test]
    async fn exceeding_the_time_budget_answers_gateway_timeout() {
        let config = ServerConfig {
            request_timeout: Duration::from_millis(1),
            ..ServerConfig::default()
        };
        let payload = json_payload(json!({
            "allocation": {"equity": 100},
            "investment": {"type": "sip", "monthlyAmount": 1000, "durationYears": 50},
            "simulationParams": {"numSimulations": DEFAULT_MAX_TRIAL_COUNT, "seed": 1}
        }));
        let response = simulate_post_handler(state(config), payload).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["error"], "simulation cancelled");
    }

    #[tokio::test]
    async fn solve_goal_reports_solution_with_disclaimer() {
        let payload = json_payload(json!({
            "allocation": {"debt": 100},
            "investment": {"type": "lumpsum", "durationYears": 5},
            "simulationParams": {"goalAmount": 1000000, "seed": 3},
            "goalType": "required-amount",
            "targetProbability": 0.5,
            "searchMax": 2000000,
            "tolerance": 1000,
            "trialsPerIteration": 200,
            "finalTrials": 200
        }));
        let response = solve_goal_handler(state(ServerConfig::default()), payload).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["goalType"], "required-amount");
        assert_eq!(body["seed"], 3);
        assert_eq!(body["feasible"], true);
        let solved = body["solvedValue"].as_f64().expect("solved value");
        assert!(solved > 0.0 && solved < 1_000_000.0);
        assert!(body["disclaimer"].is_string());
    }

    #[tokio::test]
    async fn solve_goal_without_bounds_is_rejected() {
        let payload = json_payload(json!({
            "allocation": {"debt": 100},
            "investment": {"type": "lumpsum", "durationYears": 5}
        }));
        let response = solve_goal_handler(state(ServerConfig::default()), payload).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "search_max");
    }

    #[tokio::test]
    async fn risk_profile_includes_model_allocation() {
        let payload = json_payload(json!({
            "age": 28,
            "incomeStability": "high",
            "liquidityNeeds": "low",
            "investmentKnowledge": "medium",
            "answers": {"q1": 6, "q2": 4}
        }));
        let response = risk_profile_handler(payload).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["riskCategory"], "aggressive");
        assert_eq!(body["score"], 70);
        assert_eq!(body["allocation"]["equity"], 70.0);
        assert!(body["allocationExplanation"].is_string());
    }

    #[tokio::test]
    async fn portfolio_requires_a_category() {
        let response = portfolio_handler(Ok(Query(PortfolioQuery {
            risk_category: Some("Moderate".to_string()),
        })))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["allocation"]["debt"], 40.0);

        let response = portfolio_handler(Ok(Query(PortfolioQuery::default()))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "risk_category");
    }

    #[tokio::test]
    async fn guard_endpoints_screen_and_sanitize() {
        let response =
            guard_input_handler(json_payload(json!({"text": "tips for insider trading"}))).await;
        let body = body_json(response).await;
        assert_eq!(body["allowed"], false);

        let response =
            guard_output_handler(json_payload(json!({"text": "Enjoy guaranteed returns."}))).await;
        let body = body_json(response).await;
        assert_eq!(body["modified"], true);
        let text = body["text"].as_str().expect("text");
        assert!(!text.to_lowercase().contains("guaranteed returns"));
        assert!(text.ends_with(crate::advisory::DISCLAIMER));

        let response = guard_input_handler(json_payload(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tax_saving_plan_follows_the_regime() {
        let response = tax_saving_handler(json_payload(json!({
            "income": 1500000,
            "regime": "Old",
            "hra": 0,
            "investmentAmount": 100000
        })))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["section80cElss"], 30_000.0);
        assert_eq!(body["section80cPpfEpfLic"], 30_000.0);
        assert_eq!(body["nps80ccd1b"], 20_000.0);
        assert_eq!(body["userRegime"], "old");
        assert_eq!(body["disclaimer"], DISCLAIMER);

        let response = tax_saving_handler(json_payload(json!({
            "regime": "new",
            "investment_amount": 900000
        })))
        .await;
        let body = body_json(response).await;
        assert_eq!(body["nps80ccd1b"], 50_000.0);
        assert!(body.get("section80cElss").is_none());

        let response = tax_saving_handler(json_payload(json!({"regime": "flat"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["message"].is_string());

        let response = tax_saving_handler(json_payload(json!({
            "regime": "old",
            "investmentAmount": -5
        })))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "investment_amount");
    }

    #[tokio::test]
    async fn glossary_defines_known_terms_and_lists_all() {
        let query = |uri: &str| {
            Query::<GlossaryQuery>::try_from_uri(&uri.parse::<Uri>().expect("uri"))
        };

        let response = glossary_handler(query("/api/glossary?term=Expense%20Ratio")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["term"], "Expense Ratio");
        assert!(
            body["definition"]
                .as_str()
                .expect("definition")
                .starts_with("Expense Ratio")
        );

        let response = glossary_handler(query("/api/glossary?term=crypto")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], DEFINITION_NOT_FOUND);

        let response = glossary_handler(query("/api/glossary")).await;
        let body = body_json(response).await;
        assert_eq!(body["terms"].as_array().expect("terms").len(), 13);
    }

    #[tokio::test]
    async fn health_and_fallback() {
        let body = body_json(health_handler().await).await;
        assert_eq!(body["status"], "ok");

        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
