fn main() {
    // Version of the compiler building this crate, for the User-Agent
    let rustc = rustc_version::version()
        .map(|version| version.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=LANGFLOW_CLIENT_RUSTC_VERSION={rustc}");
    println!("cargo:rerun-if-changed=build.rs");
}
