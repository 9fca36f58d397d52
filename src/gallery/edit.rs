//! Edit surface state: the location and description fields for one photo.

use crate::collection::PhotoRef;
use crate::metadata::PhotoMetadata;

/// Which field receives keystrokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditField {
    #[default]
    Location,
    Description,
}

impl EditField {
    pub fn toggle(&self) -> Self {
        match self {
            EditField::Location => EditField::Description,
            EditField::Description => EditField::Location,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EditField::Location => "Location",
            EditField::Description => "Description",
        }
    }
}

/// Single-line text input. The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    original: String,
    text: String,
    cursor: usize,
}

impl TextField {
    pub fn new(initial: &str) -> Self {
        Self {
            original: initial.to_string(),
            text: initial.to_string(),
            cursor: initial.chars().count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn char_at(&self, char_index: usize) -> Option<char> {
        self.text.chars().nth(char_index)
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_offset(self.cursor);
            self.text.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let at = self.byte_offset(self.cursor);
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_count() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn move_word_left(&mut self) {
        while self.cursor > 0 && self.char_at(self.cursor - 1) == Some(' ') {
            self.cursor -= 1;
        }
        while self.cursor > 0 && self.char_at(self.cursor - 1) != Some(' ') {
            self.cursor -= 1;
        }
    }

    pub fn move_word_right(&mut self) {
        let len = self.char_count();
        while self.cursor < len && self.char_at(self.cursor) != Some(' ') {
            self.cursor += 1;
        }
        while self.cursor < len && self.char_at(self.cursor) == Some(' ') {
            self.cursor += 1;
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn revert(&mut self) {
        self.text = self.original.clone();
        self.cursor = self.char_count();
    }

    pub fn is_modified(&self) -> bool {
        self.text != self.original
    }
}

/// Open edit surface for one selected photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    photo: PhotoRef,
    location: TextField,
    description: TextField,
    focus: EditField,
}

impl EditSession {
    pub fn new(photo: PhotoRef, current: &PhotoMetadata) -> Self {
        Self {
            photo,
            location: TextField::new(&current.location),
            description: TextField::new(&current.description),
            focus: EditField::default(),
        }
    }

    pub fn photo(&self) -> &PhotoRef {
        &self.photo
    }

    pub fn focus(&self) -> EditField {
        self.focus
    }

    pub fn set_focus(&mut self, field: EditField) {
        self.focus = field;
    }

    pub fn next_field(&mut self) {
        self.focus = self.focus.toggle();
    }

    pub fn field(&self, field: EditField) -> &TextField {
        match field {
            EditField::Location => &self.location,
            EditField::Description => &self.description,
        }
    }

    /// The focused field
    pub fn active_mut(&mut self) -> &mut TextField {
        match self.focus {
            EditField::Location => &mut self.location,
            EditField::Description => &mut self.description,
        }
    }

    pub fn location(&self) -> &str {
        self.location.text()
    }

    pub fn description(&self) -> &str {
        self.description.text()
    }

    pub fn revert(&mut self) {
        self.location.revert();
        self.description.revert();
    }

    pub fn is_modified(&self) -> bool {
        self.location.is_modified() || self.description.is_modified()
    }

    /// Current field values
    pub fn values(&self) -> PhotoMetadata {
        PhotoMetadata {
            location: self.location.text().to_string(),
            description: self.description.text().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefilled_and_unmodified() {
        let session = EditSession::new(
            PhotoRef::new("a"),
            &PhotoMetadata {
                location: "Paris".into(),
                description: "Tower".into(),
            },
        );
        assert_eq!(session.location(), "Paris");
        assert_eq!(session.description(), "Tower");
        assert_eq!(session.field(EditField::Location).cursor(), 5);
        assert!(!session.is_modified());
    }

    #[test]
    fn test_typing_goes_to_focused_field() {
        let mut session = EditSession::new(PhotoRef::new("a"), &PhotoMetadata::default());
        for c in "Lyon".chars() {
            session.active_mut().insert_char(c);
        }
        session.next_field();
        assert_eq!(session.focus(), EditField::Description);
        for c in "Old town".chars() {
            session.active_mut().insert_char(c);
        }

        assert_eq!(
            session.values(),
            PhotoMetadata {
                location: "Lyon".into(),
                description: "Old town".into()
            }
        );
        assert!(session.is_modified());
        session.revert();
        assert_eq!(session.values(), PhotoMetadata::default());
    }

    #[test]
    fn test_multibyte_editing() {
        let mut field = TextField::new("Café");
        field.backspace();
        assert_eq!(field.text(), "Caf");
        field.insert_char('é');
        field.move_home();
        field.delete();
        assert_eq!(field.text(), "afé");
        field.move_end();
        field.move_left();
        field.insert_char('ï');
        assert_eq!(field.text(), "afïé");
        assert_eq!(field.cursor(), 3);
    }

    #[test]
    fn test_word_movement() {
        let mut field = TextField::new("near the  river");
        field.move_word_left();
        assert_eq!(field.cursor(), 10);
        field.move_word_left();
        assert_eq!(field.cursor(), 5);
        field.move_word_right();
        assert_eq!(field.cursor(), 10);
    }

    #[test]
    fn test_clear_then_revert() {
        let mut field = TextField::new("keep");
        field.clear();
        assert_eq!(field.text(), "");
        assert!(field.is_modified());
        field.revert();
        assert_eq!(field.text(), "keep");
        assert!(!field.is_modified());
    }
}
