use letvar_lang::{Config, Request, Status};
use rstest::{fixture, rstest};

const HOST_VARIABLES: [&str; 4] = ["uri", "remote_addr", "arg_id", "empty"];

#[fixture]
fn config() -> Config {
    Config::load_with_seed(
        r#"
        # Arithmetic
        let $sum $arg_id + 0x10;
        let $diff 100 - $arg_id - 1;
        let $product $arg_id * -2;
        let $quotient $arg_id / 4;
        let $remainder $arg_id % 4;
        let $masked $arg_id & 0xF;
        let $flags $arg_id | 1;

        # Strings
        let $cache_key $remote_addr . ":" . $uri;
        let $prefix substr($uri, 1, 3);
        let $tail substr($uri, 5, 0);
        let $uri_len length($uri);
        let $empty_len length($empty);
        let $lowest min($arg_id, 7);
        let $highest max($arg_id, 7);
        let $win_path "C:\tmp\\" . $arg_id;
        let $tab_joined 'a\x09b';

        # Hashes
        let $etag md5($uri);
        let $short_sha substr(sha256($uri), 0, 12);

        # Derived from derived
        let $bucket_key "b" . $bucket;
        let_mod $bucket $arg_id 3;
        let_hash $shard $remote_addr 0 2;

        # Captures
        let $section $1;
        let $whole $0;

        # Failures
        let $bad_div $arg_id / 0;
        let $bad_int $uri + 1;
        let $missing_capture $9;
        "#,
        HOST_VARIABLES,
        42,
    )
    .unwrap()
}

fn request(config: &Config) -> Request<'_> {
    let mut request = Request::new(config);
    request.set_input("uri", "/img/logo.png");
    request.set_input("remote_addr", "10.0.0.1");
    request.set_input("arg_id", "22");
    request.set_input("empty", "");
    request.match_captures(r"^/(\w+)/", "/img/logo.png").unwrap();
    request
}

#[rstest]
#[case::sum("sum", "38")]
#[case::left_assoc("diff", "77")]
#[case::negative_literal("product", "-44")]
#[case::quotient("quotient", "5")]
#[case::remainder("remainder", "2")]
#[case::masked("masked", "6")]
#[case::flags("flags", "23")]
#[case::concat("cache_key", "10.0.0.1:/img/logo.png")]
#[case::substr("prefix", "img")]
#[case::substr_to_end("tail", "logo.png")]
#[case::length("uri_len", "13")]
#[case::length_empty("empty_len", "0")]
#[case::min("lowest", "7")]
#[case::max("highest", "22")]
#[case::md5("etag", "6f1b6ef5c98869100b3534ebfd661ce0")]
#[case::mod_extractor("bucket", "1")]
#[case::derived_from_derived("bucket_key", "b1")]
#[case::capture("section", "img")]
#[case::whole_match("whole", "/img/")]
#[case::unknown_escape("win_path", "C:\\tmp\\22")]
#[case::hex_escape("tab_joined", "a\tb")]
fn test_derived_values(config: Config, #[case] name: &str, #[case] expected: &str) {
    let request = request(&config);
    let (value, status) = request.get(name);

    assert_eq!(status, Status::Ok, "${} failed", name);
    assert_eq!(String::from_utf8(value).unwrap(), expected);
}

#[rstest]
#[case::zero_division("bad_div", Status::Error)]
#[case::coercion("bad_int", Status::Error)]
#[case::capture("missing_capture", Status::NotFound)]
#[case::undeclared("not_declared", Status::NotFound)]
fn test_failures(config: Config, #[case] name: &str, #[case] expected: Status) {
    let request = request(&config);
    assert_eq!(request.get(name), (Vec::new(), expected));
}

#[rstest]
fn test_missing_input(config: Config) {
    let request = Request::new(&config);

    assert_eq!(request.get("sum"), (Vec::new(), Status::NotFound));
    assert_eq!(request.get("cache_key"), (Vec::new(), Status::NotFound));
}

#[rstest]
fn test_hash_extractor_is_md5_prefix(config: Config) {
    let request = request(&config);
    let (shard, _) = request.get("shard");

    let mut expected = Config::load_with_seed("let $h md5($remote_addr);", ["remote_addr"], 0)
        .map(|config| {
            let mut request = Request::new(&config);
            request.set_input("remote_addr", "10.0.0.1");
            request.get("h").0
        })
        .unwrap();
    expected.truncate(2);

    assert_eq!(shard, expected);
}

#[rstest]
fn test_sha256_prefix(config: Config) {
    let request = request(&config);
    let (value, status) = request.get("short_sha");

    assert_eq!(status, Status::Ok);
    assert_eq!(value.len(), 12);
    assert!(value.iter().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

#[test]
fn test_random_range_is_bounded_and_seeded() {
    let source = "let_rand $dice 1 6;\nlet $roll rand();";
    let a = Config::load_with_seed(source, Vec::<String>::new(), 9).unwrap();
    let b = Config::load_with_seed(source, Vec::<String>::new(), 9).unwrap();

    for _ in 0..50 {
        let (x, status) = Request::new(&a).get("dice");
        let (y, _) = Request::new(&b).get("dice");
        let n: i64 = String::from_utf8(x.clone()).unwrap().parse().unwrap();

        assert_eq!(status, Status::Ok);
        assert!((1..=6).contains(&n));
        assert_eq!(x, y);
    }

    let (roll, status) = Request::new(&a).get("roll");
    assert_eq!(status, Status::Ok);
    assert!(String::from_utf8(roll).unwrap().parse::<i64>().unwrap() >= 0);
}

#[test]
fn test_concurrent_requests_share_config() {
    let config = Config::load_with_seed("let $key $uri . \"#\" . rand();", ["uri"], 1).unwrap();

    std::thread::scope(|scope| {
        let handles = (0..4)
            .map(|i| {
                let config = &config;
                scope.spawn(move || {
                    let mut request = Request::new(config);
                    let uri = format!("/t{}", i);
                    request.set_input("uri", uri.as_str());
                    let (value, status) = request.get("key");
                    (uri, value, status)
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let (uri, value, status) = handle.join().unwrap();
            assert_eq!(status, Status::Ok);
            assert!(value.starts_with(format!("{}#", uri).as_bytes()));
        }
    });
}

#[rstest]
#[case::syntax("let $a (1 + 2;", "ParseError::ExpectedClosingParen")]
#[case::mixed("let $a 1 + 2 * 3;", "ParseError::MixedOperators")]
#[case::arity("let $a substr($uri, 1);", "ParseError::ArityMismatch")]
#[case::unknown_function("let $a upper($uri);", "ParseError::UndefinedFunction")]
#[case::unknown_variable("let $a $host;", "ParseError::UnknownVariable")]
#[case::unterminated("let $a 'abc;", "LexerError::InvalidStringLiteral")]
#[case::zero_divisor("let_mod $a $uri 0;", "ConfigError::ZeroDivisor")]
#[case::inverted("let_rand $a 5 1;", "ConfigError::InvertedRange")]
#[case::duplicate("let $a 1; let $a 2;", "ConfigError::DuplicateVariable")]
fn test_load_errors(#[case] source: &str, #[case] code: &str) {
    use miette::Diagnostic;

    let err = Config::load(source, HOST_VARIABLES).unwrap_err();
    assert_eq!(err.code().map(|c| c.to_string()), Some(code.to_string()));
}
