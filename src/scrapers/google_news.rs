//! News coverage for a batch of post titles.

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::models::Article;
use crate::outputs::json::save_json;
use crate::snapshot::{SnapshotClient, TriggerRequest};

#[derive(Debug, Serialize)]
pub struct KeywordInput {
    url: String,
    keyword: String,
    country: &'static str,
    language: &'static str,
}

/// One keyword search per title against `source_url`, batched into a single job.
pub fn news_request(dataset_id: &str, source_url: &str, titles: &[String]) -> TriggerRequest<KeywordInput> {
    TriggerRequest {
        dataset_id: dataset_id.to_string(),
        params: vec![
            ("include_errors", "true".to_string()),
            ("limit_multiple_results", "10".to_string()),
        ],
        inputs: titles
            .iter()
            .map(|title| KeywordInput {
                url: source_url.to_string(),
                keyword: title.clone(),
                country: "",
                language: "",
            })
            .collect(),
    }
}

/// Search recent news for every title. Articles come back in the order the
/// dataset produced them. The raw snapshot, errored records included, is
/// archived as `google_snapshot-<ts>.json`.
#[instrument(level = "info", skip_all, fields(titles = titles.len()))]
pub async fn fetch_news_for(
    client: &SnapshotClient,
    config: &Config,
    titles: &[String],
) -> Result<Vec<Article>> {
    if titles.is_empty() {
        info!("No titles to search for");
        return Ok(Vec::new());
    }

    let datasets = &config.settings.datasets;
    let request = news_request(&datasets.news_search, &datasets.news_source_url, titles);

    let snapshot_id = client.trigger(&request).await?;
    let snapshot = client.poll(&snapshot_id).await?;

    if let Err(e) = save_json(&snapshot.raw, "google_snapshot", &config.settings.data_dir).await {
        error!(error = %e, "Failed to archive news snapshot");
    }

    let articles: Vec<Article> = snapshot.records.iter().filter_map(Article::from_record).collect();
    info!(count = articles.len(), raw = snapshot.raw.len(), "Collected news articles");
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::snapshot::tests::fast_policy;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_one_input_per_title() {
        let titles = vec!["A".to_string(), "B".to_string()];
        let request = news_request("gd_news", "https://news.google.com/", &titles);
        let body = serde_json::to_value(&request.inputs).unwrap();
        assert_eq!(
            body,
            json!([
                {"url": "https://news.google.com/", "keyword": "A", "country": "", "language": ""},
                {"url": "https://news.google.com/", "keyword": "B", "country": "", "language": ""}
            ])
        );
    }

    #[tokio::test]
    async fn test_empty_titles_make_no_request() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = SnapshotClient::new(Client::new(), &server.uri(), "bd-key", fast_policy(3));
        assert!(fetch_news_for(&client, &config, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_news_preserves_upstream_order() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());

        Mock::given(method("POST"))
            .and(path("/datasets/v3/trigger"))
            .and(query_param("limit_multiple_results", "10"))
            .and(body_json(json!([
                {"url": "https://news.google.com/", "keyword": "Example", "country": "", "language": ""}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"snapshot_id": "s_n"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/datasets/v3/snapshot/s_n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"keyword": "Example", "url": "http://c", "date": "2024-12-01T00:00:00Z"},
                {"keyword": "Example", "url": "http://b", "date": "2024-12-12T00:00:00Z"},
                {"keyword": "Example", "title": "no link"}
            ])))
            .mount(&server)
            .await;

        let client = SnapshotClient::new(Client::new(), &server.uri(), "bd-key", fast_policy(3));
        let articles = fetch_news_for(&client, &config, &["Example".to_string()]).await.unwrap();
        let urls: Vec<_> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["http://c", "http://b"]);
    }
}
