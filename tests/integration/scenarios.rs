//! Request scenarios run through the full stack.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use openliga_proxy::providers::transport::{TransportError, TransportResponse};
    use openliga_proxy::types::ErrorCode;

    use crate::mock_transport::{pipeline, router, test_config, MockTransport};

    fn to_json(envelope: &openliga_proxy::types::ResponseEnvelope) -> Value {
        serde_json::to_value(envelope).unwrap()
    }

    fn post_execute(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/proxy/execute")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_team_end_to_end() {
        let transport = MockTransport::ok(r#"{"TeamId":7,"TeamName":"FC Example"}"#);
        let pipeline = pipeline(&test_config(3, 60), transport.clone());

        let envelope = pipeline.execute("GetTeam", &json!({"teamId": 7}), "req-team".into()).await;
        let json = to_json(&envelope);

        assert_eq!(json["success"], true);
        assert_eq!(json["requestId"], "req-team");
        assert_eq!(
            json["data"],
            json!({"id": 7, "name": "FC Example", "shortName": null, "foundedYear": null, "logo": null})
        );
        assert_eq!(json["metadata"]["provider"], "openliga");
        assert_eq!(transport.urls(), vec!["https://api.openligadb.de/api/getteam/7".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_payload_is_validation_error() {
        let transport = MockTransport::ok("{}");
        let pipeline = pipeline(&test_config(3, 60), transport.clone());

        let envelope = pipeline.execute("GetTeam", &json!({}), "req-empty".into()).await;
        let json = to_json(&envelope);

        assert_eq!(envelope.error_code(), Some(ErrorCode::ValidationError));
        assert_eq!(json["error"]["details"]["teamId"]["type"], "missing");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_operation_over_http() {
        let transport = MockTransport::ok("{}");
        let app = router(&test_config(3, 60), transport.clone());

        let resp = app
            .oneshot(post_execute(json!({"operationType": "Bogus", "requestId": "r-1", "payload": {}})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "UNKNOWN_OPERATION");
        assert_eq!(json["requestId"], "r-1");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_timeout_exhausts_retries() {
        let transport = MockTransport::new(vec![Err(TransportError::Timeout(Duration::from_secs(5)))]);
        let pipeline = pipeline(&test_config(2, 60), transport.clone());

        let envelope = pipeline.execute("GetTeam", &json!({"teamId": 7}), "req-timeout".into()).await;
        let json = to_json(&envelope);

        assert_eq!(transport.calls(), 3);
        assert_eq!(envelope.http_status(), 502);
        assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(json["error"]["details"]["statusCode"], 504);
        assert_eq!(json["error"]["details"]["error"], "Request timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_503_then_success() {
        let transport = MockTransport::new(vec![
            Ok(TransportResponse { status: 503, body: String::new() }),
            Ok(TransportResponse { status: 200, body: r#"[{"LeagueId":4608,"LeagueName":"Bundesliga"}]"#.into() }),
        ]);
        let pipeline = pipeline(&test_config(3, 60), transport.clone());

        let envelope = pipeline.execute("ListLeagues", &json!({}), "req-retry".into()).await;
        let json = to_json(&envelope);

        assert!(envelope.is_success());
        assert_eq!(transport.calls(), 2);
        assert_eq!(json["data"][0]["id"], 4608);
        assert_eq!(json["data"][0]["country"], "");
    }

    #[tokio::test]
    async fn test_rate_limit_over_http() {
        let transport = MockTransport::ok("[]");
        let cfg = test_config(0, 2);
        let app = router(&cfg, transport.clone());
        let request = || post_execute(json!({"operationType": "ListLeagues", "payload": {}}));

        for _ in 0..2 {
            let resp = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = app.oneshot(request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = resp.headers()["retry-after"].to_str().unwrap().parse().unwrap();
        assert!(retry_after > 0 && retry_after <= 60);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_season_is_optional_in_url() {
        let transport = MockTransport::ok("[]");
        let pipeline = pipeline(&test_config(0, 60), transport.clone());

        let envelope = pipeline
            .execute("GetLeagueMatches", &json!({"leagueId": 4608, "season": 2024}), "req-m".into())
            .await;
        assert!(envelope.is_success());
        assert_eq!(transport.urls(), vec!["https://api.openligadb.de/api/getmatchdata/4608/2024".to_string()]);
    }

    #[tokio::test]
    async fn test_head_to_head_list_is_summarized() {
        let transport = MockTransport::ok(
            r#"[{"MatchID":1,"Team1":{"TeamId":40,"TeamName":"A"},"Team2":{"TeamId":7,"TeamName":"B"},"MatchResults":[{"PointsTeam1":3,"PointsTeam2":1}]}]"#,
        );
        let pipeline = pipeline(&test_config(0, 60), transport.clone());

        let envelope = pipeline.execute("GetMatch", &json!({"teamId1": 40, "teamId2": 7}), "req-h2h".into()).await;
        let json = to_json(&envelope);

        assert_eq!(transport.urls(), vec!["https://api.openligadb.de/api/getmatchdata/40/7".to_string()]);
        assert_eq!(json["data"][0]["team1"], "A");
        assert_eq!(json["data"][0]["result"], json!({"team1Goals": 3, "team2Goals": 1}));
        assert_eq!(json["data"][0]["status"], "completed");
    }
}
