use pagestream_core::{
    CounterStream, PageStream, PaginationState, ResponseStream, StateError, StaticStream,
};
use pretty_assertions::assert_eq;

fn counter(resource: &str) -> CounterStream {
    let state = PaginationState::parse(resource)
        .unwrap()
        .with_advancing_key("pageIndex");
    CounterStream::new(state).unwrap()
}

#[test]
fn counter_with_unset_key_starts_at_zero() {
    let mut stream = counter("http://localhost:8080/pag");
    assert_eq!(
        stream.next_url().unwrap(),
        "http://localhost:8080/pag?pageIndex=0"
    );
    assert_eq!(
        stream.next_url().unwrap(),
        "http://localhost:8080/pag?pageIndex=1"
    );
}

#[test]
fn counter_seeds_from_resource_query_and_keeps_param_order() {
    let mut stream = counter("http://api.example.com/items?pageIndex=3&pageSize=100");
    assert_eq!(
        stream.next_url().unwrap(),
        "http://api.example.com/items?pageIndex=3&pageSize=100"
    );
    assert_eq!(
        stream.next_url().unwrap(),
        "http://api.example.com/items?pageIndex=4&pageSize=100"
    );
}

#[test]
fn counter_appends_new_key_after_existing_params() {
    let mut stream = counter("http://api.example.com/items?pageSize=100");
    assert_eq!(
        stream.next_url().unwrap(),
        "http://api.example.com/items?pageSize=100&pageIndex=0"
    );
}

#[test]
fn counter_accepts_external_override() {
    let mut stream = counter("http://localhost/pag");
    stream.next_url();
    stream.advance(Some("10"));
    assert_eq!(stream.next_url().unwrap(), "http://localhost/pag?pageIndex=10");

    stream.advance(Some("not-a-number"));
    assert_eq!(stream.next_url().unwrap(), "http://localhost/pag?pageIndex=11");
}

#[test]
fn counter_ends_instead_of_overflowing() {
    let mut stream = counter(&format!("http://localhost/pag?pageIndex={}", i64::MAX));
    assert_eq!(
        stream.next_url().unwrap(),
        format!("http://localhost/pag?pageIndex={}", i64::MAX)
    );
    assert_eq!(stream.next_url(), None);
    assert_eq!(stream.next_url(), None);

    // An external value revives the counter.
    stream.advance(Some("7"));
    assert_eq!(stream.next_url().unwrap(), "http://localhost/pag?pageIndex=7");
}

#[test]
fn counter_requires_advancing_key_and_integer_seed() {
    let state = PaginationState::parse("http://localhost/pag").unwrap();
    assert_eq!(
        CounterStream::new(state).unwrap_err(),
        StateError::MissingAdvancingKey
    );

    let state = PaginationState::parse("http://localhost/pag?page=abc")
        .unwrap()
        .with_advancing_key("page");
    assert!(matches!(
        CounterStream::new(state),
        Err(StateError::NonIntegerCounter { .. })
    ));
}

#[test]
fn explicit_params_replace_resource_query() {
    let state = PaginationState::parse("http://localhost/pag?ignored=1")
        .unwrap()
        .with_params([("pageSize", "50"), ("sort", "asc")]);
    assert_eq!(state.url(), "http://localhost/pag?pageSize=50&sort=asc");
}

#[test]
fn same_state_renders_same_url() {
    let a = PaginationState::parse("http://localhost/pag?b=2&a=1").unwrap();
    let b = PaginationState::parse("http://localhost/pag?b=2&a=1").unwrap();
    assert_eq!(a.url(), b.url());
    assert_eq!(a.url(), "http://localhost/pag?b=2&a=1");
}

#[test]
fn invalid_resource_is_rejected() {
    assert!(matches!(
        PaginationState::parse("not a url"),
        Err(StateError::InvalidUrl { .. })
    ));
}

#[test]
fn static_stream_yields_sequence_then_ends() {
    let mut stream = StaticStream::new(["http://a/1", "http://a/2"]);
    stream.advance(Some("ignored"));
    assert_eq!(stream.next_url().as_deref(), Some("http://a/1"));
    assert_eq!(stream.next_url().as_deref(), Some("http://a/2"));
    assert_eq!(stream.next_url(), None);
    assert!(!stream.is_response_driven());
}

#[test]
fn response_stream_repeats_until_advanced() {
    let state = PaginationState::parse("http://localhost/pag")
        .unwrap()
        .with_advancing_key("pageIndex")
        .with_response_wait_key("next");
    let mut stream = ResponseStream::new(state).unwrap();
    assert!(stream.is_response_driven());
    assert_eq!(stream.response_wait_key(), Some("next"));

    assert_eq!(stream.next_url().unwrap(), "http://localhost/pag");
    assert_eq!(stream.next_url().unwrap(), "http://localhost/pag");

    stream.advance(Some("1"));
    assert_eq!(stream.next_url().unwrap(), "http://localhost/pag?pageIndex=1");

    stream.advance(None);
    assert_eq!(stream.next_url(), None);
}

#[test]
fn response_stream_without_advancing_key_uses_wait_key() {
    let state = PaginationState::parse("http://localhost/feed")
        .unwrap()
        .with_response_wait_key("cursor");
    let mut stream = ResponseStream::new(state).unwrap();
    stream.advance(Some("abc def"));
    assert_eq!(stream.next_url().unwrap(), "http://localhost/feed?cursor=abc+def");
}

#[test]
fn response_stream_requires_wait_key() {
    let state = PaginationState::parse("http://localhost/feed").unwrap();
    assert_eq!(
        ResponseStream::new(state).unwrap_err(),
        StateError::MissingWaitKey
    );
}
