use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};
use shopchat_core::{Product, Sender};
use crate::app::{App, InputMode};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(format!(" {} ", app.title), Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled(app.backend_url.clone(), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn role_line(label: &'static str, color: Color) -> Line<'static> {
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

/// Card for one product, indented under the assistant's text
fn push_product_lines(product: &Product, lines: &mut Vec<Line<'static>>) {
    let detail_style = Style::default().fg(Color::DarkGray);

    let mut heading = vec![
        Span::styled("  ▪ ", Style::default().fg(Color::Magenta)),
        Span::styled(
            if product.name.is_empty() {
                "Unnamed product".to_string()
            } else {
                product.name.clone()
            },
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(price) = product.formatted_price() {
        heading.push(Span::raw("  "));
        heading.push(Span::styled(
            price,
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }
    lines.push(Line::from(heading));

    if !product.product_type.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("    Type: {}", product.product_type),
            detail_style,
        )));
    }
    if !product.description.is_empty() {
        lines.push(Line::from(format!("    {}", product.description)));
    }
    if let Some(url) = product.image_url.as_deref().filter(|url| !url.is_empty()) {
        lines.push(Line::from(Span::styled(
            format!("    image: {}", url),
            detail_style.add_modifier(Modifier::UNDERLINED),
        )));
    }
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.conversation.log() {
        match msg.sender() {
            Sender::User => {
                lines.push(role_line("You:", Color::Cyan));
                for line in msg.text().lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Sender::Assistant => {
                lines.push(role_line("Assistant:", Color::Yellow));
                for line in msg.text().lines() {
                    lines.push(parse_markdown_line(line));
                }
                if !msg.products().is_empty() {
                    lines.push(Line::default());
                    for product in msg.products() {
                        push_product_lines(product, &mut lines);
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if app.is_busy() {
        lines.push(role_line("Assistant:", Color::Yellow));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Rows `text` occupies once word-wrapped to `width` columns, using the
/// same wrap settings as the chat paragraph
fn wrapped_height(text: &Text<'static>, width: u16) -> u16 {
    let rows = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(width.max(1));
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(" Chat ");

    let lines = chat_lines(app);
    let text = if lines.is_empty() {
        Text::from(Span::styled(
            "Ask the assistant about products...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    let inner = block.inner(area);
    app.update_chat_metrics(inner.height, wrapped_height(&text, inner.width));

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    frame.render_widget(chat, area);

    if app.chat_total_lines > app.chat_height {
        let mut scrollbar_state = ScrollbarState::new(usize::from(app.chat_total_lines - app.chat_height))
            .position(usize::from(app.scroll));
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let busy = app.is_busy();

    let (border_color, title) = if busy {
        (Color::DarkGray, " Waiting for reply... ")
    } else if editing {
        (Color::Yellow, " Message ")
    } else {
        (Color::DarkGray, " Message (i to type) ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width > 0 && cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            app.placeholder.clone(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        let text_color = if busy { Color::DarkGray } else { Color::Cyan };
        Paragraph::new(visible_text).style(Style::default().fg(text_color))
    };

    frame.render_widget(input.block(input_block), area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.is_busy() {
        (" WAITING ", Style::default().bg(Color::Magenta).fg(Color::White))
    } else {
        match app.input_mode {
            InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
            InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(if app.is_busy() { " (waiting) " } else { " send " }, label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
            Span::styled(" Ctrl-C ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
