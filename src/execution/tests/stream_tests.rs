//! Tests for the pull-based line decoder.

use crate::execution::{EventStream, StreamEvent, StreamRecord};
use rstest::rstest;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn yields_one_record_per_line_and_trailing_partial_line() -> eyre::Result<()> {
    let input: &[u8] = b"{\"type\":\"system\",\"subtype\":\"init\"}\n\nplain text\r\n{\"type\":\"result\",\"subtype\":\"success\"}";
    let mut stream = EventStream::new(input);

    let first = stream.next_record().await?;
    let second = stream.next_record().await?;
    let third = stream.next_record().await?;
    let fourth = stream.next_record().await?;

    assert!(matches!(first, Some(StreamRecord::Event(StreamEvent::System(_)))));
    assert_eq!(second, Some(StreamRecord::Raw("plain text".to_owned())));
    assert!(matches!(third, Some(StreamRecord::Event(StreamEvent::Result(_)))));
    assert_eq!(fourth, None);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn buffers_partial_lines_across_reads() -> eyre::Result<()> {
    let (mut writer, reader) = tokio::io::duplex(64);
    let producer = tokio::spawn(async move {
        writer.write_all(b"{\"type\":\"assi").await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer
            .write_all(b"stant\",\"message\":{\"content\":[]}}\nsecond")
            .await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.write_all(b" line\n").await?;
        writer.shutdown().await
    });
    let mut stream = EventStream::new(reader);

    let first = stream.next_record().await?;
    let second = stream.next_record().await?;
    let third = stream.next_record().await?;
    producer.await??;

    assert!(matches!(first, Some(StreamRecord::Event(StreamEvent::Assistant(_)))));
    assert_eq!(second, Some(StreamRecord::Raw("second line".to_owned())));
    assert_eq!(third, None);
    Ok(())
}
