#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use topichub::topic::{endpoint_topic, parse_topic_with_prefix, tokenize, TopicFilter};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    prefix: String,
    topic: String,
    filter: String,
}

fuzz_target!(|input: FuzzInput| {
    let full = format!("{}{}", input.prefix, input.topic);

    // Разбор не должен паниковать, а удачный разбор собирается обратно.
    if let Some(addr) = parse_topic_with_prefix(&full, &input.prefix) {
        assert!(!addr.component.is_empty());
        assert!(!addr.endpoint.is_empty());
        if tokenize(&input.topic).iter().all(|level| !level.is_empty()) {
            assert_eq!(
                endpoint_topic(addr.component, addr.endpoint, addr.kind),
                input.topic
            );
        }
    }

    // Топик как фильтр всегда совпадает сам с собой, `#` совпадает со всем.
    assert!(TopicFilter::parse(&input.topic).matches(&input.topic));
    assert!(TopicFilter::parse("#").matches(&input.topic));

    let filter = TopicFilter::parse(&input.filter);
    let _ = filter.matches(&input.topic);
});
