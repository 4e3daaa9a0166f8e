use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Terminal;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use crate::core::diagnose::{self, PlainView, ProbeReport, ReportView};
use crate::core::inject::{Checkpoint, Injector};
use crate::core::{payload, resolver, snapshot, ConfigManager};
use crate::models::{
    Payload, ReadyEvent, DEFAULT_CLIENT_RANK, DEFAULT_SERVER_RANK, DEFAULT_TRACKED_KEYS,
};
use crate::runtime::ClientRuntime;

/// 注入检查点的重放顺序
const CHECKPOINTS: [Checkpoint; 3] = [
    Checkpoint::Immediate,
    Checkpoint::DocumentParsed,
    Checkpoint::ResourcesLoaded,
];

/// 诊断叠加层应用：默认休眠，Ctrl+D 显式唤起。
/// 对命名空间严格只读，探测走 diagnose 而非管理器缓存
pub struct App {
    runtime: ClientRuntime,
    injector: Injector,
    manager: ConfigManager,
    payload: Payload,
    events: broadcast::Receiver<ReadyEvent>,
    overlay_visible: bool,
    report: Option<ProbeReport>,
    /// 消费者视角：管理器解析出的值（掩码展示）
    consumer_lines: Vec<String>,
    checkpoint_idx: usize,
    status_message: String,
    running: bool,
}

impl App {
    /// 从进程环境构建：服务端解析快照、编码载荷、附带页面数据侧通道，
    /// 并在 Immediate 检查点完成首次注入
    pub fn new() -> crate::error::Result<Self> {
        let keys: Vec<String> = DEFAULT_TRACKED_KEYS.iter().map(|k| k.to_string()).collect();
        let sources = resolver::ranked(DEFAULT_SERVER_RANK, None);
        let refs = resolver::as_refs(&sources);
        let snapshot = snapshot::build_snapshot(&keys, &refs);
        let payload = payload::encode(&snapshot)?;

        let page_data: Vec<(String, String)> = snapshot
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Ok(Self::with_parts(payload, page_data))
    }

    /// 从现成载荷与页面数据构建（用于测试与非环境驱动的演示）
    pub fn with_parts<I, K, V>(payload: Payload, page_data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let runtime = ClientRuntime::with_page_data(page_data);
        let events = runtime.subscribe();
        let mut app = Self {
            runtime,
            injector: Injector::new(DEFAULT_TRACKED_KEYS.iter().copied()),
            manager: ConfigManager::with_default_keys(),
            payload,
            events,
            overlay_visible: false,
            report: None,
            consumer_lines: Vec::new(),
            checkpoint_idx: 0,
            status_message: "Ready".to_string(),
            running: true,
        };
        // 首次注入：载荷随渲染输出立即执行
        app.injector
            .inject(&mut app.runtime, &app.payload.clone(), CHECKPOINTS[0]);
        app.manager.reload(&app.runtime);
        app.refresh_consumers();
        app
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn report(&self) -> Option<&ProbeReport> {
        self.report.as_ref()
    }

    pub fn runtime(&self) -> &ClientRuntime {
        &self.runtime
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    /// 重新探测所有命名空间（不碰管理器缓存）
    fn refresh_report(&mut self) {
        self.report = Some(diagnose::probe(
            &self.runtime,
            self.manager.keys(),
            DEFAULT_CLIENT_RANK,
        ));
    }

    /// 刷新消费者视角展示
    fn refresh_consumers(&mut self) {
        let keys: Vec<String> = self.manager.keys().to_vec();
        let mut lines = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.manager.get(&self.runtime, key) {
                Some(value) => lines.push(format!("{} = {}", key, mask(&value))),
                None => lines.push(format!("{} = (absent)", key)),
            }
        }
        self.consumer_lines = lines;
    }

    /// 在下一个生命周期检查点防御性重注入
    fn reinject(&mut self) {
        self.checkpoint_idx = (self.checkpoint_idx + 1).min(CHECKPOINTS.len() - 1);
        let checkpoint = CHECKPOINTS[self.checkpoint_idx];
        let payload = self.payload.clone();
        let report = self.injector.inject(&mut self.runtime, &payload, checkpoint);
        self.set_status(format!(
            "Re-injected at {} (revision {})",
            checkpoint.label(),
            report.revision
        ));
    }

    /// 排空就绪通知。叠加层打开时随通知自动重探
    pub fn poll_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.set_status(format!(
                        "{} notification: {} keys (revision {})",
                        if event.refresh { "Refresh" } else { "Ready" },
                        event.keys.len(),
                        event.revision
                    ));
                    if self.overlay_visible {
                        self.refresh_report();
                    }
                }
                // 落后的订阅者丢失旧通知后继续收新的
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    /// 处理键盘输入。Ctrl+D 是叠加层的操作员和弦
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.overlay_visible = !self.overlay_visible;
                if self.overlay_visible {
                    self.refresh_report();
                    self.set_status("Overlay opened");
                } else {
                    self.set_status("Overlay closed");
                }
            }
            KeyCode::Char('r') => {
                self.manager.reload(&self.runtime);
                self.refresh_consumers();
                self.set_status("Manager reloaded");
            }
            KeyCode::Char('i') => {
                self.reinject();
                self.refresh_consumers();
            }
            _ => {}
        }
    }

    /// 启动 TUI 事件循环
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            self.poll_events();
            terminal.draw(|frame| self.render(frame))?;

            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    self.handle_key(key.code, key.modifiers);
                }
            }
        }
        Ok(())
    }

    /// 渲染整个界面
    fn render(&self, frame: &mut ratatui::Frame) {
        let area = frame.area();

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_title(frame, outer[0]);
        if self.overlay_visible {
            self.render_overlay(frame, outer[1]);
        } else {
            self.render_dormant(frame, outer[1]);
        }
        self.render_status(frame, outer[2]);
    }

    fn render_title(&self, frame: &mut ratatui::Frame, area: Rect) {
        let state = self.runtime.state();
        let title = Paragraph::new(format!(
            "Config Relay - ready={} revision={} checkpoint={}",
            state.ready,
            state.revision,
            CHECKPOINTS[self.checkpoint_idx].label()
        ))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    /// 休眠视图：只展示消费者视角，不做任何探测
    fn render_dormant(&self, frame: &mut ratatui::Frame, area: Rect) {
        let mut lines: Vec<Line> = vec![
            Line::from(Span::styled(
                "Consumers",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        for item in &self.consumer_lines {
            lines.push(Line::from(format!("  {}", item)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Overlay dormant. Ctrl+D to inspect.",
            Style::default().fg(Color::DarkGray),
        )));

        let body = Paragraph::new(lines).block(
            Block::default()
                .title(" Application ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(body, area);
    }

    /// 叠加层视图：最近一次探测报告
    fn render_overlay(&self, frame: &mut ratatui::Frame, area: Rect) {
        let items: Vec<ListItem> = match &self.report {
            Some(report) => PlainView
                .lines(report)
                .into_iter()
                .map(|line| {
                    let style = if line.starts_with("[--]") {
                        Style::default().fg(Color::Red)
                    } else if line.starts_with("[ok]") {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default()
                    };
                    ListItem::new(line).style(style)
                })
                .collect(),
            None => vec![ListItem::new("No probe yet.")],
        };

        let overlay = List::new(items).block(
            Block::default()
                .title(" Diagnostics Overlay ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(overlay, area);
    }

    fn render_status(&self, frame: &mut ratatui::Frame, area: Rect) {
        let status = Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&self.status_message, Style::default().fg(Color::Green)),
            Span::raw(" | "),
            Span::styled(
                "q:Quit  Ctrl+D:Overlay  i:Re-inject  r:Reload",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        let bar = Paragraph::new(status).block(Block::default().borders(Borders::ALL));
        frame.render_widget(bar, area);
    }
}

/// 掩码展示：只留前四个字符
fn mask(value: &str) -> String {
    let head: String = value.chars().take(4).collect();
    if value.chars().count() > 4 {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::encode;
    use crate::models::Snapshot;

    fn test_app() -> App {
        let snapshot = Snapshot::from_entries([("OPENAI_API_KEY", "sk-test-123")]);
        let payload = encode(&snapshot).unwrap();
        App::with_parts(payload, [("MATHPIX_APP_KEY", "mpx-456")])
    }

    #[test]
    fn test_initial_state() {
        let app = test_app();
        assert!(app.is_running());
        assert!(!app.overlay_visible());
        assert!(app.report().is_none());
        // 构造时已完成 Immediate 注入
        assert!(app.runtime().state().ready);
        assert_eq!(app.runtime().state().revision, 1);
    }

    #[test]
    fn test_overlay_toggle_probes() {
        let mut app = test_app();
        app.handle_key(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(app.overlay_visible());
        let report = app.report().unwrap();
        assert!(report.state.ready);
        assert!(report.entries.iter().any(|e| e.key == "OPENAI_API_KEY" && e.present));

        app.handle_key(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(!app.overlay_visible());
    }

    #[test]
    fn test_plain_d_does_not_toggle() {
        let mut app = test_app();
        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        assert!(!app.overlay_visible());
    }

    #[test]
    fn test_reinject_advances_checkpoint_and_revision() {
        let mut app = test_app();
        app.handle_key(KeyCode::Char('i'), KeyModifiers::NONE);
        assert_eq!(app.runtime().state().revision, 2);
        assert!(app.status_message().contains("document-parsed"));

        app.handle_key(KeyCode::Char('i'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('i'), KeyModifiers::NONE);
        // 检查点推进到最后一个后不再越界
        assert!(app.status_message().contains("resources-loaded"));
        assert_eq!(app.runtime().state().revision, 4);
    }

    #[test]
    fn test_poll_events_updates_status_and_report() {
        let mut app = test_app();
        app.handle_key(KeyCode::Char('d'), KeyModifiers::CONTROL);

        app.handle_key(KeyCode::Char('i'), KeyModifiers::NONE);
        app.poll_events();
        assert!(app.status_message().contains("notification"));
        // 叠加层打开时探测随通知刷新
        let report = app.report().unwrap();
        assert_eq!(report.state.revision, 2);
    }

    #[test]
    fn test_side_channel_key_visible_to_consumers() {
        let mut app = test_app();
        // 页面数据兜底的键也进了命名空间
        assert_eq!(app.runtime().global("MATHPIX_APP_KEY"), Some("mpx-456"));
        app.handle_key(KeyCode::Char('r'), KeyModifiers::NONE);
        assert!(app.status_message().contains("reloaded"));
    }

    #[test]
    fn test_quit() {
        let mut app = test_app();
        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.is_running());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("sk-test-123"), "sk-t…");
        assert_eq!(mask("abc"), "abc");
    }
}
