//! HTTP front end: maps `/controller` requests onto the dispatch engine.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::dispatch::validate::RawCommand;
use crate::dispatch::DispatchEngine;
use crate::midi::transport::MidiTransport;

const CONTROLLER_PATH: &str = "/controller";
const COMMAND_PARAMS: [&str; 3] = ["program", "ctrlr", "value"];

/// Status and plain-text body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub struct HttpServer {
    workers: Vec<thread::JoinHandle<()>>,
    pub listen: String,
}

impl HttpServer {
    /// Block until every worker has exited
    pub fn join(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("HTTP worker panicked");
            }
        }
    }
}

/// Bind the listener and spawn the worker threads
pub fn start<T>(config: &ServerConfig, engine: Arc<DispatchEngine<T>>) -> Result<HttpServer>
where
    T: MidiTransport + 'static,
{
    let listen = config.listen_addr();
    let server = Server::http(&listen).map_err(|e| anyhow!("Failed to bind {}: {}", listen, e))?;
    let server = Arc::new(server);

    let mut workers = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        let server = Arc::clone(&server);
        let engine = Arc::clone(&engine);
        let worker = thread::Builder::new()
            .name(format!("http-worker-{}", id))
            .spawn(move || {
                for request in server.incoming_requests() {
                    handle(&engine, request);
                }
            })?;
        workers.push(worker);
    }

    info!("Server is running on port: {}", config.port);
    Ok(HttpServer { workers, listen })
}

fn handle<T: MidiTransport>(engine: &DispatchEngine<T>, request: Request) {
    let reply = route(engine, request.method(), request.url(), request.headers());
    info!(
        method = %request.method(),
        url = %request.url(),
        status = reply.status,
        "served request"
    );

    let mut response = Response::from_string(reply.body).with_status_code(StatusCode(reply.status));
    if let Ok(header) = Header::from_bytes("Content-Type", "text/plain; charset=utf-8") {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!("Failed to write response: {}", e);
    }
}

/// Decide the reply for one request
pub fn route<T: MidiTransport>(
    engine: &DispatchEngine<T>,
    method: &Method,
    url: &str,
    headers: &[Header],
) -> Reply {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    if path != CONTROLLER_PATH {
        return Reply::new(404, "not found");
    }
    if *method != Method::Post {
        return Reply::new(405, "Please use a POST method.");
    }

    let command = match extract_command(query, headers) {
        Ok(command) => command,
        Err(message) => {
            warn!("{}", message);
            return Reply::new(400, message);
        }
    };

    let port = query_param(query, "port").or_else(|| header_param(headers, "port"));
    let result = engine.dispatch(port.as_deref(), &command);
    Reply::new(result.status_code, result.message)
}

/// Pull the command triple from the headers when any of them carries one,
/// from the query string otherwise
fn extract_command(query: &str, headers: &[Header]) -> Result<RawCommand, String> {
    let from_headers = COMMAND_PARAMS
        .iter()
        .any(|key| header_param(headers, key).is_some());
    let lookup = |key: &str| {
        if from_headers {
            header_param(headers, key)
        } else {
            query_param(query, key)
        }
    };

    let [program, controller, value] = COMMAND_PARAMS.map(lookup);
    if program.is_none() && controller.is_none() && value.is_none() {
        return Err("No query parameters/headers provided, or the request lacks one of the \
                    required ones. Check the documentation for help."
            .to_string());
    }

    match (program, controller, value) {
        (Some(program), Some(controller), Some(value)) => {
            Ok(RawCommand::new(program, controller, value))
        }
        (program, controller, _) => {
            let missing = if program.is_none() {
                "program"
            } else if controller.is_none() {
                "ctrlr"
            } else {
                "value"
            };
            Err(format!("Missing required parameter \"{}\"", missing))
        }
    }
}

fn header_param(headers: &[Header], key: &str) -> Option<String> {
    headers
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(key))
        .map(|header| header.value.as_str().to_string())
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_url_component(name) == key).then(|| decode_url_component(value))
    })
}

fn decode_url_component(input: &str) -> String {
    let mut bytes = Vec::with_capacity(input.len());
    let mut chars = input.as_bytes().iter().copied();
    while let Some(byte) = chars.next() {
        match byte {
            b'%' => {
                let hex = [chars.next().unwrap_or(b'0'), chars.next().unwrap_or(b'0')];
                if let Some(value) = std::str::from_utf8(&hex)
                    .ok()
                    .and_then(|text| u8::from_str_radix(text, 16).ok())
                {
                    bytes.push(value);
                }
            }
            b'+' => bytes.push(b' '),
            _ => bytes.push(byte),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ControllerCatalog;
    use crate::dispatch::port::DEFAULT_DEVICE_PREFIX;
    use crate::midi::transport::mock::MockTransport;

    fn engine(names: &[&str]) -> DispatchEngine<MockTransport> {
        let catalog = Arc::new(ControllerCatalog::builtin().unwrap());
        DispatchEngine::new(MockTransport::with_ports(names), catalog, DEFAULT_DEVICE_PREFIX)
    }

    fn header(key: &str, value: &str) -> Header {
        Header::from_bytes(key, value).unwrap()
    }

    #[test]
    fn test_get_is_not_allowed() {
        let engine = engine(&["VYPYR 75"]);
        let reply = route(&engine, &Method::Get, "/controller?program=176", &[]);
        assert_eq!(reply, Reply::new(405, "Please use a POST method."));
    }

    #[test]
    fn test_unknown_path() {
        let engine = engine(&["VYPYR 75"]);
        let reply = route(&engine, &Method::Post, "/amp", &[]);
        assert_eq!(reply.status, 404);
    }

    #[test]
    fn test_post_with_query() {
        let engine = engine(&["Midi Through", "VYPYR 75"]);
        let reply = route(
            &engine,
            &Method::Post,
            "/controller?program=176&ctrlr=10&value=22",
            &[],
        );
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, "Message successfully sent to VYPYR 75 on port id 1");
    }

    #[test]
    fn test_headers_take_precedence_over_query() {
        let engine = engine(&["VYPYR 75"]);
        let headers = [
            header("Program", "192"),
            header("ctrlr", "5"),
            header("value", "112"),
        ];
        let reply = route(
            &engine,
            &Method::Post,
            "/controller?program=176&ctrlr=10&value=99",
            &headers,
        );
        assert_eq!(reply.status, 200);
    }

    #[test]
    fn test_missing_parameters() {
        let engine = engine(&["VYPYR 75"]);
        let reply = route(&engine, &Method::Post, "/controller", &[]);
        assert_eq!(reply.status, 400);
        assert!(reply.body.starts_with("No query parameters/headers provided"));

        let reply = route(&engine, &Method::Post, "/controller?program=176&value=1", &[]);
        assert_eq!(reply, Reply::new(400, "Missing required parameter \"ctrlr\""));
    }

    #[test]
    fn test_partial_headers_do_not_fall_back_to_query() {
        let engine = engine(&["VYPYR 75"]);
        let headers = [header("program", "176")];
        let reply = route(
            &engine,
            &Method::Post,
            "/controller?program=176&ctrlr=10&value=1",
            &headers,
        );
        assert_eq!(reply, Reply::new(400, "Missing required parameter \"ctrlr\""));
    }

    #[test]
    fn test_port_parameter() {
        let engine = engine(&["VYPYR A", "VYPYR B", "VYPYR C"]);
        let reply = route(
            &engine,
            &Method::Post,
            "/controller?port=7&program=176&ctrlr=10&value=1",
            &[],
        );
        assert_eq!(reply, Reply::new(400, "Specified port does not exist."));

        let reply = route(
            &engine,
            &Method::Post,
            "/controller?program=176&ctrlr=10&value=1",
            &[header("port", "2")],
        );
        assert_eq!(reply.body, "Message successfully sent to VYPYR C on port id 2");
    }

    #[test]
    fn test_rejection_is_bad_request() {
        let engine = engine(&["VYPYR 75"]);
        let reply = route(
            &engine,
            &Method::Post,
            "/controller?program=176&ctrlr=10&value=23",
            &[],
        );
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("accepts 0 to 22"));
    }

    #[test]
    fn test_no_devices_is_not_found() {
        let engine = engine(&[]);
        let reply = route(
            &engine,
            &Method::Post,
            "/controller?program=176&ctrlr=10&value=1",
            &[],
        );
        assert_eq!(reply, Reply::new(404, "no MIDI output devices were found."));
    }

    #[test]
    fn test_query_param_decoding() {
        assert_eq!(query_param("a=1&value=%2012", "value"), Some(" 12".to_string()));
        assert_eq!(query_param("value=1+2", "value"), Some("1 2".to_string()));
        assert_eq!(query_param("value", "value"), Some(String::new()));
        assert_eq!(query_param("", "value"), None);
    }
}
