use letvar_lang::{Config, Request, Status};

const DIRECTIVES: &str = r#"
let $cache_key $host . ":" . $uri . "?" . $args;
let $shard substr(md5($cache_key), 0, 2);
let $next_id $arg_id + 1;
let $sha sha256($uri);
let_mod $bucket $arg_id 16;
"#;

const HOST_VARIABLES: [&str; 4] = ["host", "uri", "args", "arg_id"];

fn main() {
    divan::main();
}

fn config() -> Config {
    Config::load_with_seed(DIRECTIVES, HOST_VARIABLES, 0).unwrap()
}

#[divan::bench]
fn load_config() -> Config {
    config()
}

#[divan::bench]
fn parse_expression() -> letvar_lang::Node {
    let resolver = |name: &str| HOST_VARIABLES.iter().position(|n| *n == name);
    letvar_lang::parse(
        "substr(md5($host . \":\" . $uri), 0, 8)",
        &resolver,
    )
    .unwrap()
}

#[divan::bench(args = ["cache_key", "shard", "next_id", "sha", "bucket"])]
fn eval_variable(bencher: divan::Bencher, name: &str) {
    let config = config();

    bencher.bench_local(|| {
        let mut request = Request::new(&config);
        request.set_input("host", "example.com");
        request.set_input("uri", "/static/app.js");
        request.set_input("args", "v=3");
        request.set_input("arg_id", "41");

        let (value, status) = request.get(divan::black_box(name));
        assert_eq!(status, Status::Ok);
        value
    });
}
