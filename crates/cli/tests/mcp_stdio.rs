use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

struct Server {
    child: Child,
    out: BufReader<ChildStdout>,
}

impl Server {
    fn spawn(root: &std::path::Path) -> Self {
        let exe = env!("CARGO_BIN_EXE_fsgate-mcpd");
        let mut child = Command::new(exe)
            .current_dir(root)
            .env_remove("FSGATE_CONFIG")
            .env("PROJECT_ROOT", root)
            .env("MCP_OPA_ENABLED", "false")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("spawn fsgate-mcpd");
        let out = BufReader::new(child.stdout.take().unwrap());
        Self { child, out }
    }

    fn send(&mut self, msg: &str) {
        let sin = self.child.stdin.as_mut().unwrap();
        writeln!(sin, "{msg}").unwrap();
        sin.flush().unwrap();
    }

    fn roundtrip(&mut self, msg: &str) -> Value {
        self.send(msg);
        let mut line = String::new();
        self.out.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

#[test]
fn handshake_list_and_call() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("frontend/src")).unwrap();
    std::fs::write(dir.path().join("frontend/src/app.ts"), "export const x = 1;\n").unwrap();
    let mut s = Server::spawn(dir.path());

    let init = s.roundtrip(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{}}}"#,
    );
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["result"]["serverInfo"]["name"], "fsgate");

    // notifications get no response; the next line read belongs to id 2
    s.send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
    let list = s.roundtrip(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
    assert_eq!(list["id"], 2);
    assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 4);

    let call = s.roundtrip(
        &json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {
                "name": "read_multi_service_file",
                "arguments": {"service": "frontend", "filePath": "src/app.ts"}
            }
        })
        .to_string(),
    );
    assert_eq!(call["result"]["isError"], false);
    assert!(call["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("File: frontend/src/app.ts"));
}

#[test]
fn protocol_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = Server::spawn(dir.path());

    let bad = s.roundtrip("{oops");
    assert_eq!(bad["error"]["code"], -32700);

    let unknown = s.roundtrip(r#"{"jsonrpc":"2.0","id":7,"method":"prompts/list"}"#);
    assert_eq!(unknown["error"]["code"], -32601);
    assert_eq!(unknown["id"], 7);

    let params =
        s.roundtrip(r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"arguments":{}}}"#);
    assert_eq!(params["error"]["code"], -32602);

    let tool = s.roundtrip(
        r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"rm_rf","arguments":{}}}"#,
    );
    assert_eq!(tool["result"]["isError"], true);
    assert_eq!(tool["result"]["content"][0]["text"], "Unknown tool: rm_rf");
}
