use futures::{stream, StreamExt};
use localrag_core::Error;
use localrag_llm::ndjson::{fragments, parse_line, LineDecoder};

#[test]
fn decoder_joins_lines_split_across_chunks() {
    let mut d = LineDecoder::new();
    assert!(d.push(b"{\"a\":").is_empty());
    assert_eq!(d.push(b"1}\n{\"b\":2}\n\n{\"c\""), vec!["{\"a\":1}", "{\"b\":2}"]);
    assert_eq!(d.push(b":3}\n"), vec!["{\"c\":3}"]);
    assert_eq!(d.finish(), None);
}

#[test]
fn decoder_keeps_multibyte_characters_intact() {
    let bytes = "{\"message\":{\"content\":\"答案\"}}\n".as_bytes();
    let mut d = LineDecoder::new();
    let mut lines = d.push(&bytes[..24]);
    lines.extend(d.push(&bytes[24..]));
    assert_eq!(lines.len(), 1);
    assert_eq!(parse_line(&lines[0]).unwrap().as_deref(), Some("答案"));
}

#[test]
fn decoder_returns_unterminated_tail() {
    let mut d = LineDecoder::new();
    assert!(d.push(b"{\"done\":true}").is_empty());
    assert_eq!(d.finish().as_deref(), Some("{\"done\":true}"));
}

#[test]
fn parse_line_handles_content_done_and_errors() {
    assert_eq!(
        parse_line(r#"{"message":{"role":"assistant","content":"hi"},"done":false}"#).unwrap(),
        Some("hi".to_string())
    );
    assert_eq!(parse_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#).unwrap(), None);
    assert!(matches!(parse_line(r#"{"error":"model not loaded"}"#), Err(Error::Generation(m)) if m == "model not loaded"));
    assert!(matches!(parse_line("not json"), Err(Error::Generation(_))));
}

#[tokio::test]
async fn fragments_follow_the_body_in_order() {
    let body = stream::iter(vec![
        Ok::<_, std::io::Error>(b"{\"message\":{\"content\":\"Hel".to_vec()),
        Ok(b"lo\"},\"done\":false}\n{\"message\":{\"content\":\", world\"},\"done\":false}\n".to_vec()),
        Ok(b"{\"message\":{\"content\":\"\"},\"done\":true}".to_vec()),
    ]);
    let got: Vec<String> = fragments(body).map(|r| r.unwrap()).collect().await;
    assert_eq!(got, vec!["Hello", ", world"]);
}

#[tokio::test]
async fn error_line_terminates_the_stream() {
    let body = stream::iter(vec![Ok::<_, std::io::Error>(
        b"{\"message\":{\"content\":\"partial\"}}\n{\"error\":\"out of memory\"}\n{\"message\":{\"content\":\"never\"}}\n"
            .to_vec(),
    )]);
    let items: Vec<_> = fragments(body).collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert!(matches!(&items[1], Err(Error::Generation(m)) if m == "out of memory"));
}

#[tokio::test]
async fn transport_error_becomes_generation_error() {
    let body = stream::iter(vec![
        Ok(b"{\"message\":{\"content\":\"a\"}}\n".to_vec()),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
    ]);
    let items: Vec<_> = fragments(body).collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[1], Err(Error::Generation(m)) if m.contains("reset")));
}
