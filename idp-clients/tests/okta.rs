use idp_clients::okta::{OktaApi, OktaError, OktaRestClient, API_PRODUCTS_RULE};
use log::LevelFilter;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OktaRestClient {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
    OktaRestClient::new(&server.uri(), "api-token", reqwest::Client::builder()).unwrap()
}

#[tokio::test]
async fn test_create_application_sends_service_app() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/apps"))
        .and(header("authorization", "SSWS api-token"))
        .and(body_string_contains("\"application_type\":\"service\""))
        .and(body_string_contains("\"label\":\"billing\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "0oa1",
            "name": "oidc_client",
            "label": "billing",
            "status": "ACTIVE",
            "signOnMode": "OPENID_CONNECT",
            "credentials": { "oauthClient": { "client_id": "cid-1", "client_secret": "s3cr3t" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = client(&server).create_application("billing").await.unwrap();

    assert_eq!(app.client_id(), Some("cid-1"));
    assert_eq!(app.client_secret(), Some("s3cr3t"));
    assert_eq!(app.label, "billing");
}

#[tokio::test]
async fn test_list_applications_follows_link_header() {
    let server = MockServer::start().await;
    let next = format!("{}/api/v1/apps?after=0oa1&limit=200", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .and(query_param("after", "0oa1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "0oa2", "name": "oidc_client", "label": "second", "signOnMode": "OPENID_CONNECT" }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .and(query_param("limit", "200"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(json!([
                    { "id": "0oa1", "name": "oidc_client", "label": "first", "signOnMode": "OPENID_CONNECT" }
                ])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let apps = client(&server).list_applications().await.unwrap();

    let labels: Vec<_> = apps.iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, vec!["first", "second"]);
}

#[tokio::test]
async fn test_error_body_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/apps/0oa1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errorCode": "E0000006",
            "errorSummary": "You do not have permission to perform the requested action",
            "errorId": "abc"
        })))
        .mount(&server)
        .await;

    let err = client(&server).delete_application("0oa1").await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    match err {
        OktaError::Api { code, summary, .. } => {
            assert_eq!(code, "E0000006");
            assert!(summary.starts_with("You do not have permission"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_find_authorization_server_requires_exact_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/authorizationServers"))
        .and(query_param("q", "access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "aus1", "name": "access-legacy" },
            { "id": "aus2", "name": "access" }
        ])))
        .mount(&server)
        .await;

    let found = client(&server)
        .find_authorization_server("access")
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.id).as_deref(), Some("aus2"));
}

#[tokio::test]
async fn test_create_scope_sends_name_and_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authorizationServers/aus1/scopes"))
        .and(header("authorization", "SSWS api-token"))
        .and(body_json(json!({
            "name": "tracks",
            "description": "Track catalogue",
            "metadataPublish": "NO_CLIENTS"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "scp1",
            "name": "tracks",
            "description": "Track catalogue",
            "system": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scope = client(&server)
        .create_scope("aus1", "tracks", Some("Track catalogue"))
        .await
        .unwrap();

    assert_eq!(scope.id, "scp1");
    assert_eq!(scope.description.as_deref(), Some("Track catalogue"));
    assert!(!scope.system);
}

#[tokio::test]
async fn test_policy_rule_replaces_scopes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/authorizationServers/aus1/policies/pol1/rules/rul1"))
        .and(body_string_contains(API_PRODUCTS_RULE))
        .and(body_string_contains("\"include\":[\"a\",\"c\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .update_policy_rule("aus1", "pol1", "rul1", &["a".to_string(), "c".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_policy_rules_expose_scopes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/authorizationServers/aus1/policies/pol1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "rul1",
                "name": API_PRODUCTS_RULE,
                "conditions": { "scopes": { "include": ["tracks"] } }
            }
        ])))
        .mount(&server)
        .await;

    let rules = client(&server)
        .list_policy_rules("aus1", "pol1")
        .await
        .unwrap();
    assert_eq!(rules[0].scopes(), ["tracks".to_string()]);
}
