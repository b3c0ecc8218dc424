//! Shared test utilities for integration tests
//!
//! Provides workspace fixtures and response builders used across test files.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// A small TypeScript-ish project on disk
pub fn make_workspace() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/main.ts")
        .write_str("import { greet } from './utils/greet';\n\nconsole.log(greet('world'));\n")
        .expect("write main");
    tmp.child("src/utils/greet.ts")
        .write_str("export function greet(name: string) {\n    return 'Hello, ' + name;\n}\n")
        .expect("write greet");
    tmp.child("README.md")
        .write_str("# Demo\n")
        .expect("write readme");

    tmp
}

/// `<edit>` block with CDATA payloads
pub fn edit_block(
    path: &str,
    search: &str,
    replace: &str,
) -> String
{
    format!(
        "<edit>\n<path>{path}</path>\n<search><![CDATA[{search}]]></search>\n<replace><![CDATA[{replace}]]></replace>\n</edit>\n"
    )
}

/// `<create>` block with a CDATA payload
pub fn create_block(
    path: &str,
    content: &str,
) -> String
{
    format!("<create>\n<path>{path}</path>\n<content><![CDATA[{content}]]></content>\n</create>\n")
}
