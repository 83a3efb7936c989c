//! Caption composition for re-posted content.
//!
//! Collection names double as publishing directives:
//! `<story>,<hashtags>,<caption>` where the first two fields are `y`/`n` flags
//! and the rest is an optional custom caption (which may contain commas).

use std::sync::LazyLock;

use interfaces::{CaptionComposer, CollaboratorError, ComposedCaption};
use regex::Regex;

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\S*").expect("hashtag pattern is valid"));

/// Publishing directives decoded from a collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDirectives {
    pub as_story: bool,
    pub reuse_hashtags: bool,
    pub custom_caption: String,
}

impl CollectionDirectives {
    pub fn parse(collection_name: &str) -> interfaces::Result<Self> {
        let mut fields = collection_name.splitn(3, ',');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(story), Some(hashtags), Some(caption)) => Ok(Self {
                as_story: story == "y",
                reuse_hashtags: hashtags == "y",
                custom_caption: caption.to_string(),
            }),
            _ => Err(CollaboratorError::MalformedCollectionName {
                name: collection_name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Caption,
    Hashtags,
    User,
}

/// A caption template with `{caption}`, `{hashtags}` and `{user}` placeholders.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTemplate {
    segments: Vec<Segment>,
}

impl CaptionTemplate {
    pub fn parse(template: &str) -> interfaces::Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(CollaboratorError::InvalidTemplate(format!(
                            "unclosed placeholder '{{{}' in '{}'",
                            name, template
                        )));
                    }
                    let segment = match name.as_str() {
                        "caption" => Segment::Caption,
                        "hashtags" => Segment::Hashtags,
                        "user" => Segment::User,
                        other => {
                            return Err(CollaboratorError::InvalidTemplate(format!(
                                "unknown placeholder '{{{}}}', expected {{caption}}, {{hashtags}} or {{user}}",
                                other
                            )))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(CollaboratorError::InvalidTemplate(format!(
                        "single '}}' encountered in '{}'",
                        template
                    )))
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, caption: &str, hashtags: &str, user: &str) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Caption => caption,
                Segment::Hashtags => hashtags,
                Segment::User => user,
            })
            .collect()
    }
}

/// Every `#` followed by non-whitespace, in order of appearance.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Composes captions from collection directives and a [`CaptionTemplate`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateCaptionComposer;

impl TemplateCaptionComposer {
    pub fn new() -> Self {
        Self
    }
}

impl CaptionComposer for TemplateCaptionComposer {
    fn compose(
        &self,
        collection_name: &str,
        original_caption: Option<&str>,
        author: &str,
        template: &str,
        fallback_hashtags: &[String],
    ) -> interfaces::Result<ComposedCaption> {
        let directives = CollectionDirectives::parse(collection_name)?;
        if directives.as_story {
            return Ok(ComposedCaption::Story);
        }

        let original = original_caption.unwrap_or("");
        let hashtags = if directives.reuse_hashtags && !original.is_empty() {
            extract_hashtags(original)
        } else {
            fallback_hashtags.to_vec()
        };

        let caption = if directives.custom_caption.is_empty() {
            original
        } else {
            directives.custom_caption.as_str()
        };

        let template = CaptionTemplate::parse(template)?;
        Ok(ComposedCaption::Post(template.render(caption, &hashtags.join(" "), author)))
    }
}
