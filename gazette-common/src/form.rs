//! Binding and validation of submitted forms.
//!
//! A form is deserialized leniently (every field optional) and then cleaned.
//! Cleaning either yields typed values ready for persistence or a set of
//! field-level error messages that can be shown next to the submitted values.

use crate::{
    model::{
        Id,
        group::{Group, GroupMarker},
        media::ImageFormat,
        post::Post,
        user::UserHandle,
    },
    util::sanitize_file_name,
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter},
};

pub const REQUIRED: &str = "This field is required.";
pub const EMPTY_POST_TEXT: &str = "Enter the post text.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_TOO_SHORT: &str = "This password is too short. It must contain at least 8 characters.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password.";

pub const PASSWORD_MIN_LEN: usize = 8;

/// Errors that belong to the form as a whole rather than one field.
pub const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_default().push(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[&'static str] {
        self.0.get(field).map_or(&[][..], Vec::as_slice)
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Submitted values together with the errors found in them.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
pub struct BoundForm<F> {
    pub data: F,
    pub errors: FormErrors,
}

impl<F> BoundForm<F> {
    #[must_use]
    pub fn unbound(data: F) -> Self {
        Self {
            data,
            errors: FormErrors::default(),
        }
    }

    #[must_use]
    pub fn with_errors(data: F, errors: FormErrors) -> Self {
        Self { data, errors }
    }
}

/// An image as submitted: original file name and base64 content.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct ImageUpload {
    pub name: String,
    pub content: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UploadedImage {
    pub file_name: String,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub group: Option<Id<GroupMarker>>,
    #[serde(default, skip_serializing)]
    pub image: Option<ImageUpload>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CleanedPost {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<UploadedImage>,
}

impl PostForm {
    #[must_use]
    pub fn from_post(post: &Post) -> Self {
        Self {
            text: Some(post.text.clone()),
            group: post.group.as_ref().map(|group| group.id),
            image: None,
        }
    }

    /// `groups` are the available choices for the `group` field.
    pub fn clean(&self, groups: &[Group]) -> Result<CleanedPost, FormErrors> {
        let mut errors = FormErrors::default();

        let text = match self.text.as_deref() {
            None => {
                errors.add("text", REQUIRED);
                String::new()
            }
            Some(text) if text.trim().is_empty() => {
                errors.add("text", EMPTY_POST_TEXT);
                String::new()
            }
            Some(text) => text.to_owned(),
        };

        if let Some(group) = self.group
            && !groups.iter().any(|choice| choice.id == group)
        {
            errors.add("group", INVALID_CHOICE);
        }

        let image = self.image.as_ref().and_then(|upload| {
            let image = clean_image(upload);
            if image.is_none() {
                errors.add("image", INVALID_IMAGE);
            }
            image
        });

        errors.into_result(CleanedPost {
            text,
            group: self.group,
            image,
        })
    }
}

fn clean_image(upload: &ImageUpload) -> Option<UploadedImage> {
    let file_name = sanitize_file_name(&upload.name)?;
    let data = BASE64_STANDARD.decode(upload.content.trim()).ok()?;
    let format = ImageFormat::sniff(&data)?;

    Some(UploadedImage {
        file_name,
        format,
        data,
    })
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: Option<String>,
}

impl CommentForm {
    /// Only a missing or empty text is rejected; whitespace counts as content.
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();

        let text = match self.text.as_deref() {
            None | Some("") => {
                errors.add("text", REQUIRED);
                String::new()
            }
            Some(text) => text.to_owned(),
        };

        errors.into_result(text)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Credentials {
    pub handle: UserHandle,
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("handle", &self.handle)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl CredentialsForm {
    pub fn clean_signup(&self) -> Result<Credentials, FormErrors> {
        self.clean(true)
    }

    pub fn clean_login(&self) -> Result<Credentials, FormErrors> {
        self.clean(false)
    }

    fn clean(&self, enforce_password_length: bool) -> Result<Credentials, FormErrors> {
        let mut errors = FormErrors::default();

        let handle = match self.username.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("username", REQUIRED);
                None
            }
            Some(username) => {
                let handle = UserHandle::new(username.to_owned()).ok();
                if handle.is_none() {
                    errors.add("username", INVALID_USERNAME);
                }
                handle
            }
        };

        let password = match self.password.as_deref() {
            None | Some("") => {
                errors.add("password", REQUIRED);
                String::new()
            }
            Some(password)
                if enforce_password_length && password.chars().count() < PASSWORD_MIN_LEN =>
            {
                errors.add("password", PASSWORD_TOO_SHORT);
                String::new()
            }
            Some(password) => password.to_owned(),
        };

        match handle {
            Some(handle) => errors.into_result(Credentials { handle, password }),
            None => Err(errors),
        }
    }
}
