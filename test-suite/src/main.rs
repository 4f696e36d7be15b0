use anyhow::{anyhow, Context, Result};
use glob::glob;
use std::result::Result as StdResult;

use std::fs;
use std::path::Path;
use std::process::Command;

const INTERPRETER: &str = "../target/release/minilua";

fn main() -> Result<()> {
    compile_interpreter().context("compiling interpreter")?;

    let scripts: Vec<_> = glob("tests/*.lua")?.collect::<StdResult<_, _>>()?;
    let mut failures = 0;
    for script in &scripts {
        let expected_output = script.with_extension("out");
        let expected_output = fs::read_to_string(&expected_output)
            .with_context(|| format!("loading expected output: {}", expected_output.display()))?;
        let output = run_script(script)?;
        if output == expected_output {
            println!("{}: passed", script.display());
        } else {
            failures += 1;
            println!("{}: failed\nactual output:\n{}", script.display(), output);
        }
    }
    println!("{} of {} scripts passed", scripts.len() - failures, scripts.len());
    if failures > 0 {
        Err(anyhow!("{failures} scripts failed"))
    } else {
        Ok(())
    }
}

fn run_script(script: &Path) -> Result<String> {
    let output_bytes = Command::new(INTERPRETER)
        .arg(script)
        .output()
        .with_context(|| format!("running script {}", script.display()))?
        .stdout;
    Ok(String::from_utf8(output_bytes)?)
}

fn compile_interpreter() -> Result<()> {
    let st = Command::new("cargo")
        .args(["build", "--release", "-p", "minilua"])
        .current_dir("..")
        .status()?;
    if st.success() {
        Ok(())
    } else {
        Err(anyhow!("compiling the interpreter failed"))
    }
}
