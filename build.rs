use vergen::Emitter;
use vergen_git2::Git2Builder;

// `--version` shows `git describe`; crates.io and tarball builds fall back to "unknown".
fn main() {
    let describe = Git2Builder::default()
        .describe(true, true, None)
        .build()
        .map_err(|err| err.to_string())
        .and_then(|git2| {
            Emitter::default()
                .fail_on_error()
                .add_instructions(&git2)
                .and_then(|emitter| emitter.emit())
                .map_err(|err| err.to_string())
        });

    if let Err(err) = describe {
        println!("cargo:warning=git describe unavailable: {err}");
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE=unknown");
    }
}
