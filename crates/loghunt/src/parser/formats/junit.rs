//! JUnit XML reports (`<testsuites>` / `<testsuite>` roots).
//!
//! A small forward-only tag scanner is enough here: reports are machine
//! generated, and only `testsuite`, `testcase` and the three outcome
//! elements matter. Comments, processing instructions, doctypes and CDATA
//! outside outcome bodies are skipped.

use std::borrow::Cow;

use crate::parser::model::{category, CommandPattern, ContentFamily, EventStatus, EventType, ValidationEvent};
use crate::parser::safe;
use crate::parser::traits::{Parser, ParserMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    SelfClosing,
}

#[derive(Debug)]
struct Tag<'a> {
    name: &'a str,
    attrs: &'a str,
    kind: TagKind,
    start: usize,
}

struct TagScanner<'a> {
    xml: &'a str,
    pos: usize,
    // newline bookkeeping for monotonic offsets
    line: i32,
    counted_to: usize,
}

impl<'a> TagScanner<'a> {
    fn new(xml: &'a str) -> Self {
        Self { xml, pos: 0, line: 1, counted_to: 0 }
    }

    fn skip_past(&mut self, from: usize, terminator: &str) {
        self.pos = match self.xml[from..].find(terminator) {
            Some(offset) => from + offset + terminator.len(),
            None => self.xml.len(),
        };
    }

    fn next_tag(&mut self) -> Option<Tag<'a>> {
        loop {
            let start = self.pos + self.xml[self.pos..].find('<')?;
            let rest = &self.xml[start..];

            if rest.starts_with("<!--") {
                self.skip_past(start, "-->");
                continue;
            }
            if rest.starts_with("<![CDATA[") {
                self.skip_past(start, "]]>");
                continue;
            }
            if rest.starts_with("<?") {
                self.skip_past(start, "?>");
                continue;
            }
            if rest.starts_with("<!") {
                self.skip_past(start, ">");
                continue;
            }

            let end = start + rest.find('>')?;
            self.pos = end + 1;

            let inner = &self.xml[start + 1..end];
            let (closing, inner) = match inner.strip_prefix('/') {
                Some(inner) => (true, inner),
                None => (false, inner),
            };
            let (self_closing, inner) = match inner.strip_suffix('/') {
                Some(inner) => (true, inner),
                None => (false, inner),
            };
            let name_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
            let kind = if closing {
                TagKind::Close
            } else if self_closing {
                TagKind::SelfClosing
            } else {
                TagKind::Open
            };

            return Some(Tag { name: &inner[..name_end], attrs: &inner[name_end..], kind, start });
        }
    }

    /// Text up to `</name>`, with CDATA unwrapped and entities decoded.
    fn text_until_close(&mut self, name: &str) -> String {
        let closing = format!("</{}", name);
        let body_end = match self.xml[self.pos..].find(&closing) {
            Some(offset) => self.pos + offset,
            None => self.xml.len(),
        };
        let body = &self.xml[self.pos..body_end];
        self.skip_past(body_end, ">");

        let mut text = String::new();
        let mut rest = body;
        while let Some(open) = rest.find("<![CDATA[") {
            text.push_str(&unescape(&rest[..open]));
            let cdata = &rest[open + "<![CDATA[".len()..];
            let close = cdata.find("]]>").unwrap_or(cdata.len());
            text.push_str(&cdata[..close]);
            rest = cdata.get(close + 3..).unwrap_or("");
        }
        text.push_str(&unescape(rest));
        text.trim().to_string()
    }

    fn line_at(&mut self, offset: usize) -> i32 {
        if offset > self.counted_to {
            self.line += self.xml[self.counted_to..offset].matches('\n').count() as i32;
            self.counted_to = offset;
        }
        self.line
    }
}

/// Decode the predefined XML entities and numeric character references.
fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let c = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Attribute value by name; accepts single or double quotes.
fn attr<'a>(attrs: &'a str, key: &str) -> Option<Cow<'a, str>> {
    let mut rest = attrs;
    loop {
        rest = rest.trim_start();
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after.chars().next().filter(|q| *q == '"' || *q == '\'')?;
        let body = &after[1..];
        let end = body.find(quote)?;
        if name == key {
            return Some(unescape(&body[..end]));
        }
        rest = &body[end + 1..];
    }
}

fn attr_string(attrs: &str, key: &str) -> String {
    attr(attrs, key).map(Cow::into_owned).unwrap_or_default()
}

#[derive(Debug)]
enum Outcome {
    Failure { message: String, kind: String, text: String },
    Error { message: String, kind: String, text: String },
    Skipped { message: String },
}

#[derive(Debug)]
struct TestCase {
    name: String,
    classname: String,
    suite: String,
    time: f64,
    line: i32,
    outcome: Option<Outcome>,
}

impl TestCase {
    fn from_tag(tag: &Tag<'_>, suite: Option<&String>, line: i32) -> Self {
        Self {
            name: attr_string(tag.attrs, "name"),
            classname: attr_string(tag.attrs, "classname"),
            suite: suite.cloned().unwrap_or_default(),
            time: attr(tag.attrs, "time").map_or(0.0, |t| safe::safe_f64(&t, 0.0)),
            line,
            outcome: None,
        }
    }

    fn into_event(self, event_id: i64) -> ValidationEvent {
        let mut event = ValidationEvent { event_id, ..Default::default() };
        event.tool_name = "junit".to_string();
        event.event_type = EventType::TestResult;
        event.log_line_start = self.line;
        event.log_line_end = self.line;
        event.execution_time = self.time;
        event.function_name = if self.suite.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.suite, self.name)
        };

        match self.outcome {
            Some(Outcome::Failure { message, kind, text }) => {
                event = event.with_status(EventStatus::Fail, "error");
                event.category = "test_failure".to_string();
                event.message = if message.is_empty() { first_line(&text) } else { message };
                event.error_code = kind;
                event.log_content = text;
            }
            Some(Outcome::Error { message, kind, text }) => {
                event = event.with_status(EventStatus::Error, "error");
                event.category = "test_error".to_string();
                event.message = if message.is_empty() { first_line(&text) } else { message };
                event.error_code = kind;
                event.log_content = text;
            }
            Some(Outcome::Skipped { message }) => {
                event = event.with_status(EventStatus::Skip, "info");
                event.category = "test_skipped".to_string();
                event.message = if message.is_empty() { "Test skipped".to_string() } else { message };
            }
            None => {
                event = event.with_status(EventStatus::Pass, "info");
                event.category = "test_pass".to_string();
                event.message = "Test passed".to_string();
            }
        }

        event.test_name = self.name;
        event.ref_file = self.classname;
        event
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

/// JUnit/xUnit XML as written by surefire, pytest `--junitxml`, jest-junit
/// and most CI test reporters.
pub struct JunitXmlParser {
    meta: ParserMeta,
}

impl JunitXmlParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "junit_xml",
            "JUnit XML",
            category::TEST_FRAMEWORK,
            "JUnit XML test reports (testsuite/testcase/failure/error/skipped)",
            85,
        )
        .aliases(&["junit"])
        .groups(&["test", "java"])
        .family(ContentFamily::Xml)
        .extension(".xml")
        .commands(vec![
            CommandPattern::like("pytest %--junitxml%"),
            CommandPattern::like("mvn %test%"),
        ]);
        Self { meta }
    }
}

impl Default for JunitXmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for JunitXmlParser {
    fn can_parse(&self, content: &str) -> bool {
        if !content.trim_start().starts_with('<') || !content.contains("<testsuite") {
            return false;
        }
        let mut scanner = TagScanner::new(content);
        match scanner.next_tag() {
            Some(root) => root.kind != TagKind::Close && matches!(root.name, "testsuite" | "testsuites"),
            None => false,
        }
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;
        let mut scanner = TagScanner::new(content);
        let mut suites: Vec<String> = Vec::new();
        let mut current: Option<TestCase> = None;

        while let Some(tag) = scanner.next_tag() {
            match (tag.name, tag.kind) {
                ("testsuite", TagKind::Open) => suites.push(attr_string(tag.attrs, "name")),
                ("testsuite", TagKind::Close) => {
                    suites.pop();
                }
                ("testcase", TagKind::Open) => {
                    let line = scanner.line_at(tag.start);
                    current = Some(TestCase::from_tag(&tag, suites.last(), line));
                }
                ("testcase", TagKind::SelfClosing) => {
                    let line = scanner.line_at(tag.start);
                    events.push(TestCase::from_tag(&tag, suites.last(), line).into_event(event_id));
                    event_id += 1;
                }
                ("testcase", TagKind::Close) => {
                    if let Some(case) = current.take() {
                        events.push(case.into_event(event_id));
                        event_id += 1;
                    }
                }
                ("failure" | "error" | "skipped", TagKind::Open | TagKind::SelfClosing) => {
                    let Some(case) = current.as_mut() else {
                        continue;
                    };
                    let text = if tag.kind == TagKind::Open {
                        scanner.text_until_close(tag.name)
                    } else {
                        String::new()
                    };
                    let message = attr_string(tag.attrs, "message");
                    let kind = attr_string(tag.attrs, "type");
                    case.outcome = Some(match tag.name {
                        "failure" => Outcome::Failure { message, kind, text },
                        "error" => Outcome::Error { message, kind, text },
                        _ => Outcome::Skipped { message },
                    });
                }
                _ => {}
            }
        }

        events
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- generated by surefire -->
<testsuites>
  <testsuite name="com.acme.CartTest" tests="4">
    <testcase name="addsItem" classname="com.acme.CartTest" time="0.012"/>
    <testcase name="removesItem" classname="com.acme.CartTest" time="0.030">
      <failure message="expected:&lt;1&gt; but was:&lt;2&gt;" type="AssertionError"><![CDATA[at CartTest.java:42
at junit.Runner]]></failure>
    </testcase>
    <testcase name='checkout' classname='com.acme.CartTest' time='abc'>
      <error message="NullPointerException" type="java.lang.NullPointerException">trace &amp; more</error>
    </testcase>
    <testcase name="discount" classname="com.acme.CartTest">
      <skipped/>
    </testcase>
  </testsuite>
</testsuites>"#;

    #[test]
    fn test_can_parse() {
        let parser = JunitXmlParser::new();
        assert!(parser.can_parse(REPORT));
        assert!(parser.can_parse("<testsuite name=\"x\"></testsuite>"));
        assert!(!parser.can_parse("<html><testsuite/></html>"));
        assert!(!parser.can_parse("testsuite passed"));
    }

    #[test]
    fn test_outcomes() {
        let events = JunitXmlParser::new().parse(REPORT);
        assert_eq!(events.len(), 4);

        let pass = &events[0];
        assert_eq!(pass.status, Some(EventStatus::Pass));
        assert_eq!(pass.test_name, "addsItem");
        assert_eq!(pass.ref_file, "com.acme.CartTest");
        assert_eq!(pass.function_name, "com.acme.CartTest::addsItem");
        assert!((pass.execution_time - 0.012).abs() < 1e-9);
        assert_eq!(pass.log_line_start, 5);

        let failure = &events[1];
        assert_eq!(failure.status, Some(EventStatus::Fail));
        assert_eq!(failure.category, "test_failure");
        assert_eq!(failure.message, "expected:<1> but was:<2>");
        assert!(failure.log_content.starts_with("at CartTest.java:42"));

        let error = &events[2];
        assert_eq!(error.status, Some(EventStatus::Error));
        assert_eq!(error.error_code, "java.lang.NullPointerException");
        assert_eq!(error.log_content, "trace & more");
        assert_eq!(error.execution_time, 0.0);

        let skipped = &events[3];
        assert_eq!(skipped.status, Some(EventStatus::Skip));
        assert_eq!(skipped.event_id, 4);
    }

    #[test]
    fn test_attr_helper() {
        assert_eq!(attr(r#" name="a" classname='b'"#, "name").as_deref(), Some("a"));
        assert_eq!(attr(r#" classname="b" name="a""#, "name").as_deref(), Some("a"));
        assert_eq!(attr(r#" name="a""#, "time"), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a &lt;b&gt; &amp;&#65;&#x42;"), "a <b> &AB");
        assert_eq!(unescape("R&D"), "R&D");
    }
}
