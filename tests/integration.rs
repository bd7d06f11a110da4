//! End-to-end tests for the access decision pipeline.

use geogate::database::DatabaseOpener;
use geogate::{
    AccessEngine, AccessPolicyEvaluator, AccessReason, AccessRequest, CounterMetrics, Country,
    CountryDatabase, CountryResolver, FallbackLookupClient, LocalDatabaseManager, PolicyOverride,
    SecurityPolicy,
};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, TcpListener};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct StaticDatabase {
    code: String,
}

impl CountryDatabase for StaticDatabase {
    fn country(&self, _ip: IpAddr) -> Option<String> {
        if self.code.is_empty() {
            None
        } else {
            Some(self.code.clone())
        }
    }
}

/// Opener treating the file's content as the country code for every address.
fn content_opener() -> DatabaseOpener {
    Box::new(|path: &Path| {
        let code = fs::read_to_string(path)?.trim().to_string();
        Ok(Box::new(StaticDatabase { code }) as Box<dyn CountryDatabase>)
    })
}

/// Loopback server answering every request with `body`, counting requests.
fn counting_server(body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_server = hits.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            hits_server.fetch_add(1, Ordering::SeqCst);
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).is_ok() {
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                line.clear();
            }
            let mut stream = reader.into_inner();
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
        }
    });

    (format!("http://{}/country/{{ip}}", addr), hits)
}

struct TestEngine {
    engine: AccessEngine,
    database: LocalDatabaseManager,
    metrics: Arc<CounterMetrics>,
    _dir: tempfile::TempDir,
}

/// Build an engine over a content-opener database and the given fallback
/// template. `db_code` of `None` leaves the database not-ready.
fn build_engine(db_code: Option<&str>, fallback_template: &str, policy: SecurityPolicy) -> TestEngine {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let metrics = Arc::new(CounterMetrics::new());
    let path = dir.path().join("country.db");

    let database = LocalDatabaseManager::with_opener(&path, metrics.clone(), content_opener());
    if let Some(code) = db_code {
        fs::write(&path, code).unwrap();
        database.reload().unwrap();
    }

    let fallback = FallbackLookupClient::with_timeout(
        fallback_template,
        Duration::from_millis(500),
        metrics.clone(),
    );
    let resolver = CountryResolver::new(database.clone(), fallback, metrics.clone());
    let engine = AccessEngine::new(policy, AccessPolicyEvaluator::new(resolver), metrics.clone());

    TestEngine {
        engine,
        database,
        metrics,
        _dir: dir,
    }
}

// Fails fast at the client without touching the network
const NO_FALLBACK: &str = "http://unused.invalid/country";

fn policy(blocked: &[&str], allowed: &[&str]) -> SecurityPolicy {
    SecurityPolicy::new(
        true,
        geogate::DEFAULT_LOCAL_IP_RANGES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        true,
        allowed.iter().map(|s| s.to_string()),
        blocked.iter().map(|s| s.to_string()),
    )
}

#[test]
fn blocklist_blocks_resolved_country() {
    let fx = build_engine(Some("CN"), NO_FALLBACK, policy(&["CN", "RU"], &[]));

    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    assert!(record.blocked);
    assert_eq!(record.reason, AccessReason::InBlocklist);
    assert_eq!(record.country, Country::Code("CN".to_string()));
}

#[test]
fn allowlist_blocks_non_member() {
    let fx = build_engine(Some("DE"), NO_FALLBACK, policy(&[], &["CZ", "SK"]));

    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    assert!(record.blocked);
    assert_eq!(record.reason, AccessReason::NotInAllowlist);
    assert_eq!(record.country, Country::Code("DE".to_string()));
}

#[test]
fn blocklist_wins_when_country_on_both_lists() {
    let fx = build_engine(Some("CN"), NO_FALLBACK, policy(&["CN"], &["CN"]));

    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    assert!(record.blocked);
    assert_eq!(record.reason, AccessReason::InBlocklist);
}

#[test]
fn local_address_short_circuits_resolution() {
    let fx = build_engine(None, NO_FALLBACK, policy(&["CN"], &[]));

    for address in ["127.0.0.1", "10.1.2.3", "192.168.1.5", "fc00::1"] {
        let record = fx.engine.decide(&AccessRequest::from_address(address));
        assert!(record.allowed(), "{} must be local", address);
        assert_eq!(record.reason, AccessReason::LocalIp);
        assert_eq!(record.country, Country::Local);
    }
    // Resolution never ran
    assert_eq!(fx.metrics.cache_misses.load(Ordering::Relaxed), 0);
}

#[test]
fn unresolvable_blocks_when_blocking_unknown() {
    let fx = build_engine(None, NO_FALLBACK, policy(&[], &[]));

    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    assert!(record.blocked);
    assert_eq!(record.reason, AccessReason::UnknownCountry);
    assert_eq!(record.country, Country::Unknown);
}

#[test]
fn missing_address_allowed_when_not_blocking_unknown() {
    let mut p = policy(&[], &[]);
    p.block_unknown = false;
    let fx = build_engine(Some("CZ"), NO_FALLBACK, p);

    let record = fx.engine.decide(&AccessRequest::default());
    assert!(record.allowed());
    assert_eq!(record.reason, AccessReason::NoIp);
    assert_eq!(record.country, Country::Absent);
}

#[test]
fn fallback_resolves_and_is_cached_within_ttl() {
    let (template, hits) = counting_server("de");
    let fx = build_engine(None, &template, policy(&[], &[]));

    let first = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    let second = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));

    assert_eq!(first.country, Country::Code("DE".to_string()));
    assert_eq!(second.country, Country::Code("DE".to_string()));
    // Second decision served from cache: exactly one remote call
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(fx.metrics.cache_hits.load(Ordering::Relaxed), 1);
}

#[test]
fn override_clears_blocklist_for_one_request() {
    let fx = build_engine(Some("CN"), NO_FALLBACK, policy(&["CN"], &[]));

    let mut request = AccessRequest::from_address("203.0.113.1");
    request.overrides = PolicyOverride {
        blocked_countries: Some(String::new()),
        ..Default::default()
    };
    let record = fx.engine.decide(&request);
    assert!(record.allowed());
    assert_eq!(record.reason, AccessReason::GeoAllowed);

    // The base policy is untouched for the next request
    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    assert!(record.blocked);
    assert_eq!(record.reason, AccessReason::InBlocklist);
}

#[test]
fn override_replaces_allowlist_wholesale() {
    let fx = build_engine(Some("DE"), NO_FALLBACK, policy(&[], &["CZ"]));

    let mut request = AccessRequest::from_address("203.0.113.1");
    request.overrides = PolicyOverride {
        allowed_countries: Some("de, at".to_string()),
        ..Default::default()
    };
    let record = fx.engine.decide(&request);
    assert!(record.allowed());
}

#[test]
fn reload_changes_subsequent_decisions() {
    let fx = build_engine(Some("CZ"), NO_FALLBACK, policy(&["DE"], &[]));

    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    assert!(record.allowed());

    // Swap the database; the cache still holds the old resolution for the
    // same address, so use a fresh one
    fs::write(fx.database.path(), "DE").unwrap();
    fx.database.reload().unwrap();

    let record = fx.engine.decide(&AccessRequest::from_address("203.0.113.2"));
    assert!(record.blocked);
    assert_eq!(record.reason, AccessReason::InBlocklist);
    assert_eq!(record.country, Country::Code("DE".to_string()));
}

#[test]
fn decision_record_carries_request_context() {
    let fx = build_engine(Some("CZ"), NO_FALLBACK, policy(&[], &[]));

    let request = AccessRequest {
        client_address: Some("203.0.113.1".to_string()),
        host: "api.example.com".to_string(),
        uri: "/v1/data".to_string(),
        user_agent: "test-agent".to_string(),
        overrides: PolicyOverride::default(),
    };
    let record = fx.engine.decide(&request);

    assert_eq!(record.host, "api.example.com");
    assert_eq!(record.uri, "/v1/data");
    assert_eq!(record.user_agent, "test-agent");
    assert_eq!(record.access_label(), "allowed");
}

#[test]
fn decision_outcomes_are_counted() {
    let fx = build_engine(Some("CN"), NO_FALLBACK, policy(&["CN"], &[]));

    fx.engine.decide(&AccessRequest::from_address("203.0.113.1"));
    fx.engine.decide(&AccessRequest::from_address("127.0.0.1"));
    fx.engine.decide(&AccessRequest::default());

    assert_eq!(fx.metrics.decisions_blocked.load(Ordering::Relaxed), 2);
    assert_eq!(fx.metrics.decisions_allowed.load(Ordering::Relaxed), 1);
}
