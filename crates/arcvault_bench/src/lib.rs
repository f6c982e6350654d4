//! Benchmark utilities.

use rand::Rng;

/// Generates `size` random bytes.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Builds a `200 OK` response with a random body of `body_size` bytes.
pub fn http_response(body_size: usize) -> Vec<u8> {
    let mut raw = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {body_size}\r\n\r\n"
    )
    .into_bytes();
    raw.extend_from_slice(&random_data(body_size));
    raw
}

/// Generates `count` URIs spread over a few hosts.
pub fn generate_uris(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let host = ["example.com", "example.org", "news.example.net"][rng.gen_range(0..3)];
            format!("http://{host}/page/{i}")
        })
        .collect()
}
