use super::r#loop::Runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollAction {
    LineUp,
    LineDown,
    PageUp(usize),
    PageDown(usize),
    Home,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserInputEvent {
    /// A command line, or a `:`-prefixed host command.
    Submit(String),
    /// Cancel running blocks; quits when nothing is running.
    Interrupt,
    Scroll(ScrollAction),
    /// Move the block selection by this many blocks.
    SelectBlock(isize),
    ToggleBlockCollapse,
    ToggleOutputCollapse,
    ToggleSearch,
}

pub trait FrontendAdapter {
    fn poll_user_input(&mut self, runtime: &Runtime) -> Option<UserInputEvent>;
    fn render(&mut self, runtime: &Runtime);
    fn should_quit(&self) -> bool;

    /// Largest scroll offset the last render could honour.
    fn max_scroll(&self) -> usize {
        usize::MAX
    }
}
