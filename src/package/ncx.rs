use quick_xml::Reader;
use quick_xml::events::Event;

use super::{NavNode, find_attr, local_name, resolve_entity};
use crate::error::Result;
use crate::path::{Fragment, resolve_href};

#[derive(Default)]
struct NavPointState {
    children: Vec<NavNode>,
    label: String,
    src: Option<String>,
}

/// Parse an NCX table of contents.
///
/// `base_dir` is the directory of the NCX file. A `navPoint` without a
/// `content src` is dropped together with its children.
pub fn parse_ncx(content: &str, base_dir: &str) -> Result<Vec<NavNode>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    // stack[0] collects the top-level points.
    let mut stack: Vec<NavPointState> = vec![NavPointState::default()];
    let mut in_text = false;
    let mut in_nav_map = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => stack.push(NavPointState::default()),
                // Only the first label of a point counts.
                b"text" => {
                    in_text = stack.len() > 1 && stack.last().is_some_and(|s| s.label.is_empty())
                }
                b"content" => {
                    let src = find_attr(e.attributes(), b"src");
                    set_src(&mut stack, src);
                }
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    let src = find_attr(e.attributes(), b"src");
                    set_src(&mut stack, src);
                }
            }
            Event::Text(e) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        state.label.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navMap" => in_nav_map = false,
                b"navPoint" if in_nav_map && stack.len() > 1 => {
                    if let Some(state) = stack.pop()
                        && let Some(src) = state.src
                        && let Some(parent) = stack.last_mut()
                    {
                        parent.children.push(NavNode {
                            label: state.label.trim().to_string(),
                            href: resolve_href(base_dir, &src, Fragment::Keep),
                            children: state.children,
                        });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stack.into_iter().next().map(|root| root.children).unwrap_or_default())
}

fn set_src(stack: &mut [NavPointState], src: Option<String>) {
    if stack.len() > 1
        && let Some(state) = stack.last_mut()
        && state.src.is_none()
    {
        state.src = src;
    }
}
