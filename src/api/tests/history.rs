use super::*;
use crate::db::NewHistoryRow;
use crate::types::{ClientId, HistoryEventType, history_data};
use std::collections::HashMap;

/// Insert one event row the way the tracker records them
async fn seed(api: &TestApi, event: HistoryEventType, title: &str) {
    let mut data = HashMap::new();
    data.insert(
        history_data::DOWNLOAD_CLIENT.to_string(),
        "fake-1".to_string(),
    );
    data.insert(
        history_data::DOWNLOAD_CLIENT_ID.to_string(),
        "nzo_1".to_string(),
    );

    api.db
        .insert_history(&NewHistoryRow {
            event,
            source_title: title.to_string(),
            category: Some("tv".to_string()),
            client_id: Some(ClientId::new(1)),
            data,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_history_starts_empty() {
    let api = test_api().await;

    let (status, body) = api.get_json("/history").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], serde_json::json!([]));
    assert_eq!(body["total"], 0);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
async fn test_history_returns_recorded_events() {
    let api = test_api().await;
    seed(&api, HistoryEventType::Grabbed, "Show.S01E01.720p").await;

    let (status, body) = api.get_json("/history").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["event"], "grabbed");
    assert_eq!(items[0]["source_title"], "Show.S01E01.720p");
    assert_eq!(items[0]["category"], "tv");
    assert_eq!(items[0]["client_id"], 1);
    assert_eq!(items[0]["data"]["downloadClientId"], "nzo_1");
}

#[tokio::test]
async fn test_history_filters_by_event_type() {
    let api = test_api().await;
    seed(&api, HistoryEventType::Grabbed, "Show.S01E01.720p").await;
    seed(&api, HistoryEventType::Failed, "Show.S01E02.720p").await;
    seed(&api, HistoryEventType::Imported, "Show.S01E03.720p").await;

    let (status, body) = api.get_json("/history?event_type=failed").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["source_title"], "Show.S01E02.720p");

    let (_, body) = api.get_json("/history?event_type=imported").await;
    assert_eq!(body["items"][0]["source_title"], "Show.S01E03.720p");
}

#[tokio::test]
async fn test_history_paginates_most_recent_first() {
    let api = test_api().await;
    for n in 1..=5 {
        seed(&api, HistoryEventType::Grabbed, &format!("Show.S01E0{n}")).await;
    }

    let (status, body) = api.get_json("/history?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    assert_eq!(body["limit"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["source_title"], "Show.S01E05");
    assert_eq!(items[1]["source_title"], "Show.S01E04");

    // Last page holds the oldest row
    let (_, body) = api.get_json("/history?limit=2&offset=4").await;
    assert_eq!(body["offset"], 4);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["source_title"], "Show.S01E01");
}

#[tokio::test]
async fn test_history_clamps_the_limit() {
    let api = test_api().await;
    seed(&api, HistoryEventType::Grabbed, "Show.S01E01.720p").await;
    seed(&api, HistoryEventType::Grabbed, "Show.S01E02.720p").await;

    let (status, body) = api.get_json("/history?limit=0").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_event_type_is_rejected() {
    let api = test_api().await;

    let (status, body) = api.get_json("/history?event_type=bogus").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_event_type");
}
