//! Interactive state of the to-do list and its key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use quickstart_tasks::{Result, Task, TasksError, TasksPeer};

/// The modal text prompt used for creating and editing tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Create { title: String },
    Edit { id: String, title: String },
}

impl Prompt {
    pub fn buffer(&self) -> &str {
        match self {
            Prompt::Create { title } | Prompt::Edit { title, .. } => title,
        }
    }

    fn buffer_mut(&mut self) -> &mut String {
        match self {
            Prompt::Create { title } | Prompt::Edit { title, .. } => title,
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            Prompt::Create { .. } => " New Task ",
            Prompt::Edit { .. } => " Edit Task ",
        }
    }
}

#[derive(Debug, Default)]
pub struct App {
    tasks: Vec<Task>,
    selected: Option<usize>,
    prompt: Option<Prompt>,
    status: Option<String>,
    sync_active: bool,
    quit: bool,
}

impl App {
    pub fn new(sync_active: bool) -> Self {
        Self {
            sync_active,
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.selected.and_then(|index| self.tasks.get(index))
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    /// Last error shown in the footer.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn sync_active(&self) -> bool {
        self.sync_active
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Replace the list with a fresh observer snapshot, keeping the cursor on
    /// the same task when it is still there.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        let selected_id = self.selected_task().map(|task| task.id.clone());
        self.tasks = tasks;

        self.selected = match selected_id {
            _ if self.tasks.is_empty() => None,
            Some(id) => self
                .tasks
                .iter()
                .position(|task| task.id == id)
                .or_else(|| self.selected.map(|i| i.min(self.tasks.len() - 1))),
            None => Some(0),
        };
    }

    /// Apply a key press. Failures are logged and shown in the footer.
    pub fn handle_key(&mut self, peer: &TasksPeer, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if let Err(e) = self.dispatch(peer, key) {
            tracing::warn!(error = %e, key = ?key.code, "key action failed");
            self.status = Some(e.to_string());
        }
    }

    fn dispatch(&mut self, peer: &TasksPeer, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
        {
            self.quit = true;
            return Ok(());
        }

        match self.prompt.take() {
            Some(prompt) => self.handle_prompt_key(peer, prompt, key.code),
            None => self.handle_list_key(peer, key.code),
        }
    }

    fn handle_list_key(&mut self, peer: &TasksPeer, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(task) = self.selected_task() {
                    peer.mark_task_complete(&task.id, !task.done)?;
                }
            }
            KeyCode::Char('c') => {
                self.prompt = Some(Prompt::Create {
                    title: String::new(),
                });
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task().cloned() {
                    self.prompt = Some(Prompt::Edit {
                        id: task.id,
                        title: task.title,
                    });
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = self.selected_task() {
                    peer.delete_task(&task.id)?;
                }
            }
            KeyCode::Char('s') => {
                if peer.is_sync_active() {
                    peer.stop_sync()?;
                } else {
                    peer.start_sync()?;
                }
                self.sync_active = peer.is_sync_active();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_prompt_key(&mut self, peer: &TasksPeer, mut prompt: Prompt, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Esc => {}
            KeyCode::Enter => self.submit(peer, prompt)?,
            KeyCode::Backspace => {
                // Backspace on an empty buffer closes the prompt
                if prompt.buffer_mut().pop().is_some() {
                    self.prompt = Some(prompt);
                }
            }
            KeyCode::Char(ch) => {
                prompt.buffer_mut().push(ch);
                self.prompt = Some(prompt);
            }
            _ => self.prompt = Some(prompt),
        }
        Ok(())
    }

    fn submit(&mut self, peer: &TasksPeer, prompt: Prompt) -> Result<()> {
        if prompt.buffer().trim().is_empty() {
            return Err(TasksError::InvalidArgument(
                "task title must not be empty".into(),
            ));
        }
        match prompt {
            Prompt::Create { title } => {
                peer.add_task(&title, false)?;
                self.status = None;
                Ok(())
            }
            Prompt::Edit { id, title } => {
                peer.update_task_title(&id, &title)?;
                self.status = None;
                Ok(())
            }
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.tasks.is_empty() {
            self.selected = None;
            return;
        }
        let last = self.tasks.len() - 1;
        let next = match self.selected {
            Some(current) => current.saturating_add_signed(delta).min(last),
            None => 0,
        };
        self.selected = Some(next);
    }
}
