use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clouddns::config::ClientConfig;
use clouddns::domains::{CreateDomain, Domain, DomainListOpts};
use clouddns::records::{CreateRecord, Record, RecordListOpts};
use clouddns::secrets::Credentials;
use clouddns::transport::DEFAULT_TIMEOUT;
use clouddns::{CloudDns, Error, Flow, HttpTransport};

const TOKEN: &str = "token-1";

async fn client(server: &MockServer) -> CloudDns {
    let transport = HttpTransport::new(TOKEN, DEFAULT_TIMEOUT).unwrap();
    CloudDns::new(Arc::new(transport), format!("{}/v1.0/123", server.uri()))
}

fn job(server: &MockServer, status: &str) -> Value {
    json!({
        "callbackUrl": format!("{}/v1.0/123/status/job-1", server.uri()),
        "jobId": "job-1",
        "requestUrl": format!("{}/v1.0/123/domains", server.uri()),
        "verb": "POST",
        "status": status
    })
}

async fn mount_poll(server: &MockServer, body: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/v1.0/123/status/job-1"))
        .and(query_param("showDetails", "true"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));

    match times {
        Some(n) => mock.up_to_n_times(n).expect(n).mount(server).await,
        None => mock.expect(1).mount(server).await,
    }
}

#[tokio::test]
async fn test_connect_then_list_domains() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": {
                "token": {"id": TOKEN},
                "serviceCatalog": [{
                    "name": "cloudDNS",
                    "type": "rax:dns",
                    "endpoints": [{"publicURL": format!("{}/v1.0/123", server.uri())}]
                }]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/123/domains"))
        .and(query_param("name", "example.com"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domains": [{"id": 1, "name": "example.com", "emailAddress": "a@example.com"}],
            "totalEntries": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        identity_url: format!("{}/v2.0", server.uri()),
        ..Default::default()
    };
    let credentials = Credentials {
        username: "jdoe".to_string(),
        api_key: "key".to_string(),
    };
    let client = CloudDns::connect(&config, &credentials).await.unwrap();

    let pager = client
        .list_domains(&DomainListOpts {
            name: Some("example.com".to_string()),
        })
        .unwrap();
    let domains: Vec<Domain> = pager.all(&CancellationToken::new()).await.unwrap();

    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].name, "example.com");
}

#[tokio::test]
async fn test_create_domain_waits_for_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/123/domains"))
        .and(body_json(json!({
            "domains": [{"name": "example.com", "emailAddress": "hostmaster@example.com", "ttl": 3600}]
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(job(&server, "RUNNING")))
        .expect(1)
        .mount(&server)
        .await;
    mount_poll(&server, job(&server, "RUNNING"), Some(2)).await;

    let mut completed = job(&server, "COMPLETED");
    completed["response"] = json!({
        "domains": [{"id": "42", "accountId": "123", "name": "example.com", "emailAddress": "hostmaster@example.com"}]
    });
    mount_poll(&server, completed, None).await;

    let client = client(&server).await;
    let domain = client
        .create_domain(
            CreateDomain {
                name: "example.com".to_string(),
                email_address: "hostmaster@example.com".to_string(),
                ttl: 0,
                comment: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(domain.id, 42);
    assert_eq!(domain.account_id, 123);
}

#[tokio::test]
async fn test_failed_record_job_reports_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/123/domains/42/records"))
        .respond_with(ResponseTemplate::new(202).set_body_json(job(&server, "RUNNING")))
        .mount(&server)
        .await;

    let mut failed = job(&server, "ERROR");
    failed["error"] = json!({
        "failedItems": {},
        "code": 400,
        "message": "Validation error",
        "details": "Record name must be within the domain"
    });
    mount_poll(&server, failed, None).await;

    let client = client(&server).await;
    let err = client
        .create_record(
            42,
            &CreateRecord {
                name: "www.other.org".to_string(),
                record_type: "A".to_string(),
                data: "192.0.2.10".to_string(),
                ttl: None,
                comment: None,
                priority: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        Error::JobFailed(message) => assert_eq!(message, "Record name must be within the domain"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_delete_record() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/123/domains/42/records/A-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(job(&server, "INITIALIZED")))
        .expect(1)
        .mount(&server)
        .await;
    mount_poll(&server, job(&server, "COMPLETED"), None).await;

    let client = client(&server).await;
    client
        .delete_record(42, "A-1", &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_record_listing_follows_links() {
    let server = MockServer::start().await;
    let second = format!("{}/v1.0/123/domains/42/records?limit=2&offset=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0/123/domains/42/records"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "A-3", "name": "c.example.com", "type": "A", "data": "192.0.2.3"}],
            "links": [{"rel": "previous", "href": format!("{}/v1.0/123/domains/42/records?type=A", server.uri())}]
        })))
        .expect(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/123/domains/42/records"))
        .and(query_param("type", "A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": "A-1", "name": "a.example.com", "type": "A", "data": "192.0.2.1"},
                {"id": "A-2", "name": "b.example.com", "type": "A", "data": "192.0.2.2"}
            ],
            "links": [{"rel": "next", "href": second}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let pager = client
        .list_records(
            42,
            &RecordListOpts {
                record_type: Some("A".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let records: Vec<Record> = pager.all(&CancellationToken::new()).await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A-1", "A-2", "A-3"]);
}

#[tokio::test]
async fn test_listing_stops_when_consumer_asks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/123/domains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domains": [{"id": 1, "name": "a.example.com"}],
            "links": [{"rel": "next", "href": format!("{}/v1.0/123/domains?offset=1", server.uri())}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let pager = client.list_domains(&DomainListOpts::default()).unwrap();

    let mut seen = 0;
    pager
        .each_page(&CancellationToken::new(), |page| {
            seen += page.items.len();
            Ok(Flow::Stop)
        })
        .await
        .unwrap();

    assert_eq!(seen, 1);
}
