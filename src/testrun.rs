//! The `-t/--test-target` external test runner (spec.md §6). Carried
//! `Test`s are requests against `request.url`; the host part of that URL
//! becomes the `Host` header, while the request itself is actually sent to
//! `target` (the server under test). Exits on the first failed assertion,
//! per spec.md §7 ("Tests exit on first failed assertion").

use regex::Regex;
use url::Url;

use crate::rules::Test;

#[derive(Debug)]
pub struct TestFailure {
    pub test_name: String,
    pub reason: String,
}

impl std::fmt::Display for TestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test {:?} failed: {}", self.test_name, self.reason)
    }
}

fn build_client(insecure: bool) -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(insecure)
        .build()
}

/// Run every carried test against `target`, stopping at the first failed
/// assertion and returning it as an `Err`.
pub fn run_all(tests: &[Test], target: &str, insecure: bool) -> Result<(), TestFailure> {
    let client = build_client(insecure).map_err(|e| TestFailure {
        test_name: "<client setup>".to_string(),
        reason: e.to_string(),
    })?;
    for test in tests {
        run_one(&client, test, target)?;
    }
    Ok(())
}

fn run_one(client: &reqwest::blocking::Client, test: &Test, target: &str) -> Result<(), TestFailure> {
    let request_url = Url::parse(&test.request_url).map_err(|e| TestFailure {
        test_name: test.name.clone(),
        reason: format!("invalid request.url {:?}: {e}", test.request_url),
    })?;
    let host = request_url.host_str().ok_or_else(|| TestFailure {
        test_name: test.name.clone(),
        reason: format!("request.url {:?} has no host", test.request_url),
    })?;

    let mut target_url = Url::parse(target).map_err(|e| TestFailure {
        test_name: test.name.clone(),
        reason: format!("invalid test target {target:?}: {e}"),
    })?;
    target_url.set_path(request_url.path());
    target_url.set_query(request_url.query());

    let response = client
        .get(target_url)
        .header("Host", host)
        .send()
        .map_err(|e| TestFailure {
            test_name: test.name.clone(),
            reason: format!("request failed: {e}"),
        })?;

    if let Some(expected) = test.expect_status {
        if response.status().as_u16() != expected {
            return Err(TestFailure {
                test_name: test.name.clone(),
                reason: format!(
                    "expected status {expected}, got {}",
                    response.status().as_u16()
                ),
            });
        }
    }

    for expect_header in &test.expect_headers {
        let regex = Regex::new(&expect_header.regex).map_err(|e| TestFailure {
            test_name: test.name.clone(),
            reason: format!("invalid header regex {:?}: {e}", expect_header.regex),
        })?;
        let actual = response
            .headers()
            .get(expect_header.field.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !regex.is_match(actual) {
            return Err(TestFailure {
                test_name: test.name.clone(),
                reason: format!(
                    "header {} value {actual:?} does not match /{}/",
                    expect_header.field, expect_header.regex
                ),
            });
        }
    }

    if !test.expect_body.is_empty() {
        let body = response.text().map_err(|e| TestFailure {
            test_name: test.name.clone(),
            reason: format!("failed to read response body: {e}"),
        })?;
        for expect_body in &test.expect_body {
            let regex = Regex::new(&expect_body.regex).map_err(|e| TestFailure {
                test_name: test.name.clone(),
                reason: format!("invalid body regex {:?}: {e}", expect_body.regex),
            })?;
            if !regex.is_match(&body) {
                return Err(TestFailure {
                    test_name: test.name.clone(),
                    reason: format!("body does not match /{}/", expect_body.regex),
                });
            }
        }
    }

    Ok(())
}
