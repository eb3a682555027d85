#![no_main]

use std::convert::Infallible;

use futures_util::stream::iter;
use libfuzzer_sys::fuzz_target;
use pushpart::bytes::Bytes;
use pushpart::{Collector, Field, Multipart, Sink};
use tokio::runtime;

type Summary = Vec<(Option<String>, Option<String>, Option<String>, Bytes)>;

fn summary(fields: Vec<Field>) -> Summary {
    fields
        .into_iter()
        .map(|field| {
            (
                field.name().map(ToOwned::to_owned),
                field.file_name().map(ToOwned::to_owned),
                field.content_type().map(ToOwned::to_owned),
                field.into_bytes(),
            )
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    // Whole input at once.
    let mut multipart = Multipart::new("X-BOUNDARY", Collector::new());
    let whole = multipart
        .on_data(Bytes::copy_from_slice(data))
        .and_then(|_| multipart.on_end());
    let whole_fields = summary(multipart.into_handler().into_fields());

    // The same input split at an input-derived width must yield the same parts.
    let width = data.first().map_or(1, |&b| usize::from(b % 16) + 1);

    let mut split = Multipart::new("X-BOUNDARY", Collector::new());
    let mut split_res = Ok(());
    for chunk in data.chunks(width) {
        split_res = split.on_data(Bytes::copy_from_slice(chunk));
        if split_res.is_err() {
            break;
        }
    }
    if split_res.is_ok() {
        split_res = split.on_end();
    }

    assert_eq!(whole, split_res);
    assert_eq!(whole_fields, summary(split.into_handler().into_fields()));

    // Driven from a stream, a successful parse yields the same parts again.
    let chunks: Vec<Result<Bytes, Infallible>> = data
        .chunks(width)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();

    let rt = runtime::Builder::new_current_thread().build().expect("runtime");
    let streamed = rt.block_on(Multipart::new("X-BOUNDARY", Collector::new()).run(iter(chunks)));

    assert_eq!(whole.is_ok(), streamed.is_ok());
    if let Ok(collector) = streamed {
        assert_eq!(whole_fields, summary(collector.into_fields()));
    }
});
