use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::UnicodeWidthStr;

use crate::content::ContentVariant;
use crate::model::{CommentSort, SortMode};
use crate::runtime::Runtime;
use crate::state::{AppState, Intent, View};
use crate::view::{self, Body, CommentNode, PostDetail, PostRow, Screen, ViewOptions};

mod markup;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_CODE: Color = Color::Rgb(249, 226, 175);
const COLOR_QUOTE: Color = Color::Rgb(148, 226, 213);

const COMMENT_DEPTH_COLORS: [Color; 6] = [
    Color::Rgb(250, 179, 135),
    Color::Rgb(166, 227, 161),
    Color::Rgb(203, 166, 247),
    Color::Rgb(245, 194, 231),
    Color::Rgb(137, 220, 235),
    Color::Rgb(249, 226, 175),
];

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SIDEBAR_WIDTH: u16 = 30;

fn comment_depth_color(depth: usize) -> Color {
    COMMENT_DEPTH_COLORS[depth % COMMENT_DEPTH_COLORS.len()]
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

fn wrap_with_prefixes(
    text: &str,
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    style: Style,
) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }

    if width == 0 {
        return vec![Line::from(Span::styled(format!("{first_prefix}{text}"), style))];
    }

    let min_width = first_prefix
        .chars()
        .count()
        .max(rest_prefix.chars().count())
        .saturating_add(1);
    let options = WrapOptions::new(width.max(min_width))
        .break_words(true)
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_with_prefix(text: &str, width: usize, prefix: &str, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, prefix, prefix, style)
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let current_width: usize = line
            .spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum();
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        line.spans
            .push(Span::styled(" ".repeat(width - current_width), pad_style));
    }
}

fn sort_key_index(code: KeyCode) -> Option<usize> {
    match code {
        KeyCode::Char(ch @ '1'..='4') => Some(ch as usize - '1' as usize),
        _ => None,
    }
}

fn post_row_lines(row: &PostRow, width: usize) -> Vec<Line<'static>> {
    let marker = if row.pinned { "📌 " } else { "" };
    let saved = if row.saved { " ★" } else { "" };
    let mut lines = wrap_with_prefix(
        &format!("{marker}{}{saved}", row.title),
        width,
        " ",
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    );
    lines.extend(wrap_with_prefix(
        &format!(
            "▲ {}  ·  {}  ·  u/{}  ·  {}",
            row.score, row.subreddit, row.author, row.date
        ),
        width,
        " ",
        Style::default().fg(COLOR_TEXT_SECONDARY),
    ));
    lines.push(Line::default());
    lines
}

fn content_lines(content: &ContentVariant, width: usize) -> Vec<Line<'static>> {
    let label = Style::default()
        .fg(COLOR_ACCENT)
        .add_modifier(Modifier::BOLD);
    let link = Style::default()
        .fg(COLOR_TEXT_SECONDARY)
        .add_modifier(Modifier::UNDERLINED);
    let mut lines = Vec::new();
    match content {
        ContentVariant::Video { fallback_url } => {
            lines.push(Line::from(Span::styled("▶ Video · o plays it in the browser", label)));
            lines.extend(wrap_with_prefix(fallback_url, width, "  ", link));
        }
        ContentVariant::Gallery { items } => {
            lines.push(Line::from(Span::styled(
                format!("Gallery · {} images · i enlarges the first", items.len()),
                label,
            )));
            for item in items {
                lines.extend(wrap_with_prefix(&item.url, width, "  ", link));
            }
        }
        ContentVariant::YouTubeEmbed { video_id } => {
            lines.push(Line::from(Span::styled(
                format!("▶ YouTube video {video_id} · o opens it"),
                label,
            )));
        }
        ContentVariant::ExternalImage { url } => {
            lines.push(Line::from(Span::styled("Image · i enlarges it", label)));
            lines.extend(wrap_with_prefix(url, width, "  ", link));
        }
        ContentVariant::ExternalLink { url } => {
            lines.push(Line::from(Span::styled("Link · o opens it", label)));
            lines.extend(wrap_with_prefix(url, width, "  ", link));
        }
        ContentVariant::None => return lines,
    }
    lines.push(Line::default());
    lines
}

fn comment_lines(
    node: &CommentNode,
    width: usize,
    selected: bool,
    reveal_spoilers: bool,
) -> Vec<Line<'static>> {
    let indent = "  ".repeat(node.depth);
    let indicator = if node.body.is_none() { "▸" } else { "▾" };
    let mut header = format!("{indicator} u/{} · {} points", node.author, node.score);
    if node.pinned {
        header.push_str(" · pinned");
    }
    if node.hidden_replies > 0 {
        let suffix = if node.hidden_replies == 1 {
            "reply"
        } else {
            "replies"
        };
        header.push_str(&format!(" · {} hidden {suffix}", node.hidden_replies));
    }

    let mut meta_style = Style::default()
        .fg(comment_depth_color(node.depth))
        .add_modifier(Modifier::BOLD);
    if selected {
        meta_style = meta_style.bg(COLOR_PANEL_SELECTED_BG);
    }
    let mut lines = wrap_with_prefixes(&header, width, &indent, &format!("{indent}  "), meta_style);

    if let Some(body) = &node.body {
        let body_prefix = format!("{indent}  ");
        if body.markup.is_empty() {
            lines.extend(wrap_with_prefix(
                "(no comment body)",
                width,
                &body_prefix,
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
        } else {
            lines.extend(markup::lines(
                &body.markup,
                width,
                &body_prefix,
                Style::default().fg(COLOR_TEXT_PRIMARY),
                reveal_spoilers,
            ));
        }
        for url in &node.images {
            lines.extend(wrap_with_prefix(
                &format!("[image] {url}"),
                width,
                &body_prefix,
                Style::default().fg(COLOR_ACCENT),
            ));
        }
    }
    lines.push(Line::default());
    lines
}

/// Lines for the detail body plus the first line of every visible comment.
fn detail_lines(
    detail: &PostDetail,
    width: usize,
    selected_comment: usize,
    reveal_spoilers: bool,
) -> (Vec<Line<'static>>, Vec<usize>) {
    let mut lines = post_row_lines(&detail.row, width);
    lines.extend(content_lines(&detail.content, width));

    if !detail.body.markup.is_empty() {
        lines.extend(markup::lines(
            &detail.body.markup,
            width,
            " ",
            Style::default().fg(COLOR_TEXT_PRIMARY),
            reveal_spoilers,
        ));
        lines.push(Line::default());
    }
    for url in &detail.body.extracted_image_urls {
        lines.extend(wrap_with_prefix(
            &format!("[image] {url}"),
            width,
            " ",
            Style::default().fg(COLOR_ACCENT),
        ));
    }

    let sorts: Vec<String> = CommentSort::ALL
        .iter()
        .enumerate()
        .map(|(idx, sort)| {
            let marker = if *sort == detail.comment_sort { "●" } else { "○" };
            format!("{} {marker} {}", idx + 1, sort.label())
        })
        .collect();
    lines.push(Line::from(Span::styled(
        format!("Comments   {}", sorts.join("  ")),
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::default());

    let mut anchors = Vec::new();
    if detail.loading_comments {
        lines.push(Line::from(Span::styled(
            " Loading comments...",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
    } else if detail.comments.is_empty() {
        lines.push(Line::from(Span::styled(
            " No comments yet.",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
    } else {
        let mut rendered = Vec::new();
        view::walk_comments(&detail.comments, &mut |node| rendered.push(node));
        for (index, node) in rendered.into_iter().enumerate() {
            anchors.push(lines.len());
            lines.extend(comment_lines(
                node,
                width,
                index == selected_comment,
                reveal_spoilers,
            ));
        }
    }
    (lines, anchors)
}

fn comment_paths(detail: &PostDetail) -> Vec<Vec<usize>> {
    let mut paths = Vec::new();
    view::walk_comments(&detail.comments, &mut |node| paths.push(node.path.clone()));
    paths
}

fn detail_images(detail: &PostDetail) -> Vec<String> {
    let mut urls = match &detail.content {
        ContentVariant::Gallery { items } => items.iter().map(|item| item.url.clone()).collect(),
        ContentVariant::ExternalImage { url } => vec![url.clone()],
        _ => Vec::new(),
    };
    urls.extend(detail.body.extracted_image_urls.iter().cloned());
    urls
}

pub struct Options {
    pub state: AppState,
    pub runtime: Runtime,
    pub intents: Receiver<Intent>,
    pub view: ViewOptions,
}

pub struct Model {
    state: AppState,
    runtime: Runtime,
    intents: Receiver<Intent>,
    view_options: ViewOptions,
    spinner: Spinner,
    list_index: usize,
    sidebar_index: usize,
    comment_index: usize,
    scroll: u16,
    body_area: Rect,
    input: Option<String>,
    reveal_spoilers: bool,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        Self {
            state: opts.state,
            runtime: opts.runtime,
            intents: opts.intents,
            view_options: opts.view,
            spinner: Spinner::new(),
            list_index: 0,
            sidebar_index: 0,
            comment_index: 0,
            scroll: 0,
            body_area: Rect::default(),
            input: None,
            reveal_spoilers: false,
            needs_redraw: true,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        self.dispatch(Intent::Start);
        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            self.poll_async();

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key.code) {
                            break;
                        }
                    }
                    Event::Resize(_, _) => self.needs_redraw = true,
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                let had_toast = self.state.toast.is_some();
                self.runtime
                    .dispatch(&mut self.state, Intent::Tick, Instant::now());
                if had_toast != self.state.toast.is_some() {
                    self.needs_redraw = true;
                }
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.needs_redraw = true;
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn poll_async(&mut self) {
        if self.runtime.drain(&self.intents, &mut self.state) > 0 {
            self.clamp_cursors();
            self.needs_redraw = true;
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        self.runtime
            .dispatch(&mut self.state, intent, Instant::now());
        self.clamp_cursors();
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.state.loading_posts || self.state.loading_comments
    }

    fn screen(&self) -> Screen {
        view::render(&self.state, &self.view_options)
    }

    fn clamp_cursors(&mut self) {
        let list_len = match self.state.view {
            View::Saved => self.state.saved_posts.len(),
            _ => self.state.posts.len(),
        };
        self.list_index = self.list_index.min(list_len.saturating_sub(1));
        self.sidebar_index = self
            .sidebar_index
            .min(self.state.subscriptions.len().saturating_sub(1));
    }

    fn selected_post_id(&self) -> Option<String> {
        match &self.state.view {
            View::Feed => self.state.posts.get(self.list_index).map(|p| p.id.clone()),
            View::Saved => self
                .state
                .saved_posts
                .get(self.list_index)
                .map(|p| p.id.clone()),
            View::PostDetail { post } => Some(post.id.clone()),
            _ => None,
        }
    }

    fn open_view(&mut self, intent: Intent) {
        self.list_index = 0;
        self.comment_index = 0;
        self.scroll = 0;
        self.dispatch(intent);
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.state.popup.is_some() {
            match code {
                KeyCode::Char('y') | KeyCode::Enter => self.dispatch(Intent::ConfirmPopup),
                KeyCode::Char('n') | KeyCode::Esc => self.dispatch(Intent::CancelPopup),
                _ => {}
            }
            return false;
        }

        if let Some(input) = self.input.as_mut() {
            match code {
                KeyCode::Char(ch) => input.push(ch),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Enter => {
                    let raw = input.clone();
                    self.input = None;
                    self.dispatch(Intent::AddSubscription(raw));
                }
                KeyCode::Esc => self.input = None,
                _ => {}
            }
            self.needs_redraw = true;
            return false;
        }

        if let Some(url) = self.state.enlarged_image.clone() {
            match code {
                KeyCode::Char('o') => self.dispatch(Intent::OpenExternal(url)),
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('i') | KeyCode::Char('q') => {
                    self.dispatch(Intent::CloseImage)
                }
                _ => {}
            }
            return false;
        }

        if code == KeyCode::Char('q') {
            return true;
        }

        if self.state.sidebar_open {
            self.handle_sidebar_key(code);
            return false;
        }

        match code {
            KeyCode::Tab => {
                self.sidebar_index = self
                    .state
                    .subscriptions
                    .iter()
                    .position(|sub| {
                        sub.display_name
                            .eq_ignore_ascii_case(&self.state.selected_subreddit)
                    })
                    .unwrap_or(0);
                self.dispatch(Intent::ToggleSidebar);
                return false;
            }
            KeyCode::Char('R') => {
                self.dispatch(Intent::Reload);
                return false;
            }
            KeyCode::Char('x') if self.state.blocked_banner => {
                self.dispatch(Intent::DismissBanner);
                return false;
            }
            KeyCode::Char('f') => {
                self.open_view(Intent::OpenFeed);
                return false;
            }
            KeyCode::Char('v') => {
                self.open_view(Intent::OpenSaved);
                return false;
            }
            KeyCode::Char(',') => {
                self.open_view(Intent::OpenSettings);
                return false;
            }
            KeyCode::Char('?') => {
                self.open_view(Intent::OpenAbout);
                return false;
            }
            KeyCode::Char('a') => {
                self.input = Some(String::new());
                self.needs_redraw = true;
                return false;
            }
            KeyCode::Char('z') => {
                self.reveal_spoilers = !self.reveal_spoilers;
                self.needs_redraw = true;
                return false;
            }
            _ => {}
        }

        match self.state.view {
            View::Feed | View::Saved => self.handle_list_key(code),
            View::PostDetail { .. } => self.handle_detail_key(code),
            View::Settings => {
                if code == KeyCode::Char('C') {
                    self.dispatch(Intent::RequestClearCache);
                } else if matches!(code, KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b')) {
                    self.open_view(Intent::GoBack);
                }
            }
            View::About => {
                if matches!(code, KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b')) {
                    self.open_view(Intent::GoBack);
                }
            }
        }
        false
    }

    fn handle_sidebar_key(&mut self, code: KeyCode) {
        let count = self.state.subscriptions.len();
        match code {
            KeyCode::Tab | KeyCode::Esc => self.dispatch(Intent::CloseSidebar),
            KeyCode::Char('j') | KeyCode::Down => {
                if self.sidebar_index + 1 < count {
                    self.sidebar_index += 1;
                    self.needs_redraw = true;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.sidebar_index > 0 {
                    self.sidebar_index -= 1;
                    self.needs_redraw = true;
                }
            }
            KeyCode::Enter => {
                if let Some(sub) = self.state.subscriptions.get(self.sidebar_index) {
                    let name = sub.display_name.clone();
                    self.list_index = 0;
                    self.dispatch(Intent::SelectSubreddit(name));
                }
            }
            KeyCode::Char('a') => {
                self.input = Some(String::new());
                self.needs_redraw = true;
            }
            KeyCode::Char('e') => self.dispatch(Intent::ToggleEditMode),
            KeyCode::Char('d') | KeyCode::Delete if self.state.edit_mode => {
                if let Some(sub) = self.state.subscriptions.get(self.sidebar_index) {
                    let name = sub.display_name.clone();
                    self.dispatch(Intent::RequestRemoveSubscription(name));
                }
            }
            _ => {}
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) {
        let in_saved = matches!(self.state.view, View::Saved);
        let count = if in_saved {
            self.state.saved_posts.len()
        } else {
            self.state.posts.len()
        };
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.list_index + 1 < count {
                    self.list_index += 1;
                    self.needs_redraw = true;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.list_index > 0 {
                    self.list_index -= 1;
                    self.needs_redraw = true;
                }
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                if let Some(post_id) = self.selected_post_id() {
                    self.comment_index = 0;
                    self.scroll = 0;
                    self.dispatch(Intent::OpenPost { post_id });
                }
            }
            KeyCode::Char('y') => {
                if let Some(post_id) = self.selected_post_id() {
                    self.dispatch(Intent::SharePost { post_id });
                }
            }
            KeyCode::Char('s') if !in_saved => {
                if let Some(post_id) = self.selected_post_id() {
                    self.dispatch(Intent::SavePost { post_id });
                }
            }
            KeyCode::Char('d') if in_saved => {
                if let Some(post_id) = self.selected_post_id() {
                    self.dispatch(Intent::RequestDeleteSaved { post_id });
                }
            }
            KeyCode::Char('r') if !in_saved => self.dispatch(Intent::RefreshPosts),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') if in_saved => {
                self.open_view(Intent::GoBack)
            }
            other if !in_saved => {
                if let Some(sort) = sort_key_index(other).map(|idx| SortMode::ALL[idx]) {
                    self.list_index = 0;
                    self.dispatch(Intent::SetSort(sort));
                }
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, code: KeyCode) {
        let screen = self.screen();
        let Body::Detail(detail) = &screen.body else {
            return;
        };
        let paths = comment_paths(detail);
        match code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') | KeyCode::Char('h') => {
                self.comment_index = 0;
                self.scroll = 0;
                self.dispatch(Intent::GoBack);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.comment_index + 1 < paths.len() {
                    self.comment_index += 1;
                    self.follow_selection(detail);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.comment_index > 0 {
                    self.comment_index -= 1;
                    self.follow_selection(detail);
                }
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_add(self.body_area.height.max(1));
                self.needs_redraw = true;
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(self.body_area.height.max(1));
                self.needs_redraw = true;
            }
            KeyCode::Char(' ') | KeyCode::Char('c') => {
                if let Some(path) = paths.get(self.comment_index) {
                    self.dispatch(Intent::ToggleComment(path.clone()));
                }
            }
            KeyCode::Char('s') => {
                if let Some(post_id) = self.selected_post_id() {
                    self.dispatch(Intent::SavePost { post_id });
                }
            }
            KeyCode::Char('y') => {
                if let Some(post_id) = self.selected_post_id() {
                    self.dispatch(Intent::SharePost { post_id });
                }
            }
            KeyCode::Char('o') => {
                let url = detail.content.external_url().or_else(|| {
                    self.state.detail_post().map(|post| post.share_url())
                });
                if let Some(url) = url {
                    self.dispatch(Intent::OpenExternal(url));
                }
            }
            KeyCode::Char('i') => {
                let mut images = detail_images(detail);
                let mut selected = Vec::new();
                view::walk_comments(&detail.comments, &mut |node| selected.push(node));
                if let Some(node) = selected.get(self.comment_index) {
                    images.extend(node.images.iter().cloned());
                }
                if let Some(url) = images.into_iter().next() {
                    self.dispatch(Intent::ShowImage(url));
                }
            }
            KeyCode::Char('r') => {
                self.comment_index = 0;
                self.dispatch(Intent::RefreshComments);
            }
            other => {
                if let Some(sort) = sort_key_index(other).map(|idx| CommentSort::ALL[idx]) {
                    self.comment_index = 0;
                    self.scroll = 0;
                    self.dispatch(Intent::SetCommentSort(sort));
                }
            }
        }
    }

    fn follow_selection(&mut self, detail: &PostDetail) {
        let width = self.body_area.width as usize;
        let (_, anchors) = detail_lines(detail, width, self.comment_index, self.reveal_spoilers);
        if let Some(&anchor) = anchors.get(self.comment_index) {
            let anchor = anchor.min(u16::MAX as usize) as u16;
            let height = self.body_area.height.max(1);
            if anchor < self.scroll || anchor >= self.scroll.saturating_add(height) {
                self.scroll = anchor.saturating_sub(2);
            }
        }
        self.needs_redraw = true;
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let screen = self.screen();
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let banner_height = if screen.banner.is_some() { 2 } else { 0 };
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(banner_height),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        self.draw_header(frame, layout[0], &screen);
        if let Some(banner) = &screen.banner {
            let text = Paragraph::new(format!("{banner}  (x dismiss)"))
                .style(Style::default().fg(COLOR_BG).bg(COLOR_ERROR))
                .wrap(Wrap { trim: true });
            frame.render_widget(text, layout[1]);
        }

        let main = if screen.sidebar.is_some() {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
                .split(layout[2]);
            self.draw_sidebar(frame, chunks[0], &screen);
            chunks[1]
        } else {
            layout[2]
        };
        self.draw_body(frame, main, &screen);
        self.draw_footer(frame, layout[3], &screen);

        if let Some(dialog) = &screen.dialog {
            let area = centered_rect(50, 25, full);
            frame.render_widget(Clear, area);
            let lines = vec![
                Line::from(Span::styled(
                    dialog.message.clone(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )),
                Line::default(),
                Line::from(vec![
                    Span::styled(
                        format!("[y] {}", dialog.confirm_label),
                        Style::default()
                            .fg(COLOR_ERROR)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("    "),
                    Span::styled("[n] Cancel", Style::default().fg(COLOR_TEXT_SECONDARY)),
                ]),
            ];
            let popup = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title(Span::styled(
                            "Confirm",
                            Style::default()
                                .fg(COLOR_ACCENT)
                                .add_modifier(Modifier::BOLD),
                        ))
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(COLOR_ACCENT))
                        .style(Style::default().bg(COLOR_PANEL_BG)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(popup, area);
        }

        if let Some(url) = &screen.image_overlay {
            let area = centered_rect(70, 30, full);
            frame.render_widget(Clear, area);
            let lines = vec![
                Line::from(Span::styled(
                    url.clone(),
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::UNDERLINED),
                )),
                Line::default(),
                Line::from(Span::styled(
                    "o open in browser · Esc close",
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )),
            ];
            let overlay = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title("Image")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(COLOR_ACCENT))
                        .style(Style::default().bg(COLOR_PANEL_BG)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(overlay, area);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect, screen: &Screen) {
        let mut spans = vec![Span::styled(
            format!(" zennit · {} ", screen.header.title),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )];
        if screen.header.show_sort {
            for (idx, sort) in SortMode::ALL.iter().enumerate() {
                let active = *sort == screen.header.sort;
                let marker = if active { "●" } else { "○" };
                spans.push(Span::styled(
                    format!(" {} {marker} {} ", idx + 1, sort.label()),
                    Style::default().fg(if active {
                        COLOR_ACCENT
                    } else {
                        COLOR_TEXT_SECONDARY
                    }),
                ));
            }
        }
        if self.is_loading() {
            spans.push(Span::styled(
                format!(" {}", self.spinner.frame()),
                Style::default().fg(COLOR_ACCENT),
            ));
        }
        let header = Paragraph::new(Line::from(spans))
            .style(Style::default().bg(COLOR_PANEL_FOCUSED_BG));
        frame.render_widget(header, area);
    }

    fn draw_sidebar(&self, frame: &mut Frame<'_>, area: Rect, screen: &Screen) {
        let Some(sidebar) = &screen.sidebar else {
            return;
        };
        let title = if sidebar.edit_mode {
            "Subscriptions (edit)"
        } else {
            "Subscriptions"
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let items: Vec<ListItem> = sidebar
            .entries
            .iter()
            .map(|entry| {
                let marker = if entry.selected { "●" } else { " " };
                let suffix = if sidebar.edit_mode { "  [d]" } else { "" };
                ListItem::new(Line::from(Span::styled(
                    format!("{marker} {}{suffix}", entry.name),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )))
            })
            .collect();
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(COLOR_PANEL_SELECTED_BG)
                .add_modifier(Modifier::BOLD),
        );
        let mut list_state = ListState::default().with_selected(Some(self.sidebar_index));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_body(&mut self, frame: &mut Frame<'_>, area: Rect, screen: &Screen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.body_area = inner;
        let width = inner.width as usize;

        match &screen.body {
            Body::Loading(message) => {
                let text = Paragraph::new(format!("{} {message}", self.spinner.frame()))
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                    .alignment(Alignment::Center);
                frame.render_widget(text, inner);
            }
            Body::Feed(rows) | Body::Saved(rows) => {
                if rows.is_empty() {
                    let message = if matches!(screen.body, Body::Saved(_)) {
                        "No saved posts yet. Press s on a post to save it."
                    } else {
                        "No posts to show. Press r to refresh."
                    };
                    let text = Paragraph::new(message)
                        .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                        .alignment(Alignment::Center);
                    frame.render_widget(text, inner);
                    return;
                }
                let items: Vec<ListItem> = rows
                    .iter()
                    .map(|row| {
                        let mut lines = post_row_lines(row, width);
                        pad_lines_to_width(&mut lines, inner.width);
                        ListItem::new(lines)
                    })
                    .collect();
                let list = List::new(items)
                    .highlight_style(Style::default().bg(COLOR_PANEL_SELECTED_BG));
                let mut list_state = ListState::default().with_selected(Some(self.list_index));
                frame.render_stateful_widget(list, inner, &mut list_state);
            }
            Body::Detail(detail) => {
                let (lines, _) =
                    detail_lines(detail, width, self.comment_index, self.reveal_spoilers);
                let max_scroll = lines.len().saturating_sub(1).min(u16::MAX as usize) as u16;
                self.scroll = self.scroll.min(max_scroll);
                let paragraph = Paragraph::new(lines).scroll((self.scroll, 0));
                frame.render_widget(paragraph, inner);
            }
            Body::Settings(settings) => {
                let mut lines = vec![
                    Line::from(Span::styled(
                        "Subscriptions",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::default(),
                ];
                for name in &settings.subscriptions {
                    let marker = if *name == settings.selected { "●" } else { "○" };
                    lines.push(Line::from(format!("  {marker} {name}")));
                }
                lines.push(Line::default());
                lines.push(Line::from(format!("Saved posts: {}", settings.saved_count)));
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "a add subscription · Tab then e to remove · C clear all stored data",
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
                frame.render_widget(
                    Paragraph::new(lines)
                        .style(Style::default().fg(COLOR_TEXT_PRIMARY))
                        .wrap(Wrap { trim: false }),
                    inner,
                );
            }
            Body::About(about) => {
                let mut lines = vec![
                    Line::from(Span::styled(
                        format!("Zennit {}", about.version),
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::default(),
                ];
                lines.extend(about.lines.iter().map(|line| Line::from(*line)));
                frame.render_widget(
                    Paragraph::new(lines)
                        .style(Style::default().fg(COLOR_TEXT_PRIMARY))
                        .wrap(Wrap { trim: true }),
                    inner,
                );
            }
        }
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect, screen: &Screen) {
        let (text, style) = if let Some(input) = &self.input {
            (
                format!("Add subscription (r/name, u/name, user/name/m/multi): {input}▏"),
                Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_PANEL_FOCUSED_BG),
            )
        } else if let Some(toast) = &screen.toast {
            (
                toast.clone(),
                Style::default()
                    .fg(COLOR_SUCCESS)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            (
                self.footer_text(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
        };
        let footer = Paragraph::new(text)
            .style(style)
            .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }

    fn footer_text(&self) -> String {
        if self.state.sidebar_open {
            return "j/k move · Enter open · a add · e edit · d remove (edit) · Tab close"
                .to_string();
        }
        let view = match self.state.view {
            View::Feed => "j/k move · Enter open · 1-4 sort · s save · y share · r refresh",
            View::PostDetail { .. } => {
                "j/k comments · Space fold · 1-4 sort · i image · o open · s save · y share · z spoilers · b back"
            }
            View::Saved => "j/k move · Enter open · d delete · y share · b back",
            View::Settings => "a add subscription · C clear data · b back",
            View::About => "b back",
        };
        format!("{view} · Tab subs · v saved · , settings · ? about · q quit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format;
    use crate::model::Comment;
    use crate::view::comment_nodes;

    fn total_width(line: &Line<'_>) -> usize {
        line.spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum()
    }

    fn detail_with_comments(comments: &[Comment]) -> PostDetail {
        PostDetail {
            row: PostRow {
                id: "a".into(),
                title: "Title".into(),
                author: "me".into(),
                subreddit: "r/rust".into(),
                date: "01/01/1970, 12:00 AM".into(),
                score: "1".into(),
                pinned: false,
                saved: false,
            },
            body: format::format("body **text**"),
            content: ContentVariant::None,
            comment_sort: CommentSort::Best,
            loading_comments: false,
            comments: comment_nodes(comments, &[]),
        }
    }

    fn leaf(body: &str) -> Comment {
        Comment {
            author: "c".into(),
            body: body.into(),
            media_metadata: None,
            is_pinned: false,
            upvote_score: 3,
            replies: Vec::new(),
            is_visible: true,
        }
    }

    #[test]
    fn pad_lines_extends_to_width() {
        let mut lines = vec![Line::from("abc")];
        pad_lines_to_width(&mut lines, 6);
        assert_eq!(total_width(&lines[0]), 6);
    }

    #[test]
    fn pad_lines_does_not_shorten() {
        let mut lines = vec![Line::from("abcdef")];
        pad_lines_to_width(&mut lines, 3);
        assert_eq!(total_width(&lines[0]), 6);
    }

    #[test]
    fn sort_keys_map_to_indices() {
        assert_eq!(sort_key_index(KeyCode::Char('1')), Some(0));
        assert_eq!(sort_key_index(KeyCode::Char('4')), Some(3));
        assert_eq!(sort_key_index(KeyCode::Char('5')), None);
    }

    #[test]
    fn detail_anchors_follow_comment_order() {
        let mut parent = leaf("parent");
        parent.replies.push(leaf("child"));
        let detail = detail_with_comments(&[parent, leaf("second")]);
        let (lines, anchors) = detail_lines(&detail, 60, 0, false);
        assert_eq!(anchors.len(), 3);
        assert!(anchors.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(anchors[2] < lines.len());
        assert_eq!(comment_paths(&detail), vec![vec![0], vec![0, 0], vec![1]]);
    }

    #[test]
    fn collapsed_comment_shows_hidden_count() {
        let mut parent = leaf("parent");
        parent.replies.push(leaf("child"));
        parent.is_visible = false;
        let nodes = comment_nodes(&[parent], &[]);
        let lines = comment_lines(&nodes[0], 80, false, false);
        let header: String = lines[0]
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(header.contains("1 hidden reply"), "{header}");
    }

    #[test]
    fn gallery_images_come_first() {
        let mut detail = detail_with_comments(&[]);
        detail.content = ContentVariant::ExternalImage {
            url: "https://i.redd.it/a.png".into(),
        };
        assert_eq!(detail_images(&detail), vec!["https://i.redd.it/a.png".to_string()]);
    }
}
