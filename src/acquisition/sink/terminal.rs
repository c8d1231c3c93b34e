//! Terminal live view
//!
//! Renders each frame to the terminal with Unicode half-block characters
//! (two image rows per cell). Grayscale frames are drawn through the jet
//! colormap next to a colorbar of the normalized intensity scale.

use std::io::{self, Stdout, stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use tracing::{debug, info};

use crate::acquisition::common::error::{AcquisitionError, Result};
use crate::acquisition::common::stop::StopSignal;
use crate::acquisition::convert::ProcessedImage;
use crate::acquisition::sink::colormap::jet;
use crate::acquisition::sink::frame_sink::FrameSink;

const TITLE: &str = "Live Normalized Intensity View";
const COLORBAR_LABEL: &str = "Normalized Intensity";
/// Bar, gap and three label digits
const COLORBAR_WIDTH: u16 = 7;

/// Live display sink. Pressing `q` or Ctrl+C raises the stop signal.
pub struct TerminalDisplay<B: Backend> {
    terminal: Terminal<B>,
    stop: StopSignal,
    interactive: bool,
    restored: bool,
    frames_shown: u64,
}

impl TerminalDisplay<CrosstermBackend<Stdout>> {
    /// Takes over the terminal: raw mode plus the alternate screen.
    pub fn open(stop: StopSignal) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        info!("Starting live view with colorbar...");

        let mut display = Self {
            terminal,
            stop,
            interactive: true,
            restored: false,
            frames_shown: 0,
        };
        display.draw(None)?;
        Ok(display)
    }
}

impl<B: Backend> TerminalDisplay<B> {
    /// Renders into an arbitrary backend without touching the real terminal.
    pub fn with_backend(backend: B, stop: StopSignal) -> Result<Self> {
        let terminal = Terminal::new(backend).map_err(|e| AcquisitionError::SinkWrite(e.to_string()))?;
        Ok(Self {
            terminal,
            stop,
            interactive: false,
            restored: true,
            frames_shown: 0,
        })
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }

    fn draw(&mut self, image: Option<&ProcessedImage>) -> Result<()> {
        let status = format!(
            "{} | frame {} | q: quit",
            COLORBAR_LABEL,
            image.map(|i| i.frame_number).unwrap_or(0)
        );
        self.terminal
            .draw(|f| {
                let area = f.area();
                f.render_widget(
                    LiveView {
                        image,
                        status: &status,
                    },
                    area,
                );
            })
            .map_err(|e| AcquisitionError::SinkWrite(e.to_string()))?;
        Ok(())
    }

    fn handle_input(&mut self) -> Result<()> {
        if !self.interactive {
            return Ok(());
        }
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                let ctrl_c = key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c || key.code == KeyCode::Char('q') {
                    info!("Interrupted by user.");
                    self.stop.raise();
                }
            }
        }
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        debug!("Terminal restored");
        Ok(())
    }
}

impl<B: Backend> FrameSink for TerminalDisplay<B> {
    fn write(&mut self, image: &ProcessedImage) -> Result<()> {
        self.draw(Some(image))?;
        self.frames_shown += 1;
        self.handle_input()
    }

    fn release(&mut self) -> Result<()> {
        self.restore()?;
        debug!(frames = self.frames_shown, "Live view closed");
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        self.handle_input()
    }
}

impl<B: Backend> Drop for TerminalDisplay<B> {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Title row, image, colorbar and status row
struct LiveView<'a> {
    image: Option<&'a ProcessedImage>,
    status: &'a str,
}

impl Widget for LiveView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 3 || area.width <= COLORBAR_WIDTH {
            return;
        }

        let title_x = area.x + area.width.saturating_sub(TITLE.len() as u16) / 2;
        buf.set_string(title_x, area.y, TITLE, Style::default().fg(Color::White));

        let body = Rect {
            x: area.x,
            y: area.y + 1,
            width: area.width,
            height: area.height - 2,
        };
        let image_area = Rect {
            width: body.width - COLORBAR_WIDTH,
            ..body
        };
        let bar_area = Rect {
            x: body.x + image_area.width,
            width: COLORBAR_WIDTH,
            ..body
        };

        match self.image {
            Some(image) => render_image(image, image_area, buf),
            None => {
                let msg = "Waiting for camera...";
                let x = image_area.x + image_area.width.saturating_sub(msg.len() as u16) / 2;
                let y = image_area.y + image_area.height / 2;
                buf.set_string(x, y, msg, Style::default());
            }
        }
        render_colorbar(bar_area, buf);

        let status_y = area.y + area.height - 1;
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, status_y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }
        let text = if self.status.len() > area.width as usize {
            &self.status[..area.width as usize]
        } else {
            self.status
        };
        buf.set_string(
            area.x,
            status_y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

fn display_color(image: &ProcessedImage, x: usize, y: usize) -> Color {
    let (r, g, b) = if image.layout.is_color() {
        image.rgb_at(x, y)
    } else {
        jet(image.rgb_at(x, y).0)
    };
    Color::Rgb(r, g, b)
}

/// Fits the image into `area` keeping its aspect ratio, two rows per cell.
fn render_image(image: &ProcessedImage, area: Rect, buf: &mut Buffer) {
    if image.width == 0 || image.height == 0 || area.width == 0 || area.height == 0 {
        return;
    }

    let frame_aspect = image.width as f64 / image.height as f64;
    let term_width = area.width as f64;
    let term_height = (area.height * 2) as f64;

    let (display_width, display_height) = if term_width / term_height > frame_aspect {
        let h = term_height;
        ((h * frame_aspect) as u16, (h / 2.0) as u16)
    } else {
        let w = term_width;
        (w as u16, (w / frame_aspect / 2.0) as u16)
    };
    let display_width = display_width.max(1);
    let display_height = display_height.max(1);

    let x_offset = area.x + area.width.saturating_sub(display_width) / 2;
    let y_offset = area.y + area.height.saturating_sub(display_height) / 2;
    let x_scale = image.width as f64 / display_width as f64;
    let y_scale = image.height as f64 / (display_height * 2) as f64;

    for ty in 0..display_height {
        for tx in 0..display_width {
            let src_x = (tx as f64 * x_scale) as usize;
            let src_y_top = (ty as f64 * 2.0 * y_scale) as usize;
            let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as usize;

            if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                cell.set_char('▀');
                cell.set_fg(display_color(image, src_x, src_y_top));
                cell.set_bg(display_color(image, src_x, src_y_bottom));
            }
        }
    }
}

/// Vertical jet scale from 255 (top) to 0 (bottom) with end and middle labels.
fn render_colorbar(area: Rect, buf: &mut Buffer) {
    if area.height == 0 {
        return;
    }
    let bar_x = area.x + 1;
    let span = area.height.saturating_sub(1).max(1) as u32;

    for row in 0..area.height {
        let value = (255 * (span - (row as u32).min(span)) / span) as u8;
        let (r, g, b) = jet(value);
        for x in bar_x..bar_x + 2 {
            if let Some(cell) = buf.cell_mut((x, area.y + row)) {
                cell.set_char(' ');
                cell.set_bg(Color::Rgb(r, g, b));
            }
        }
    }

    let label_x = bar_x + 3;
    buf.set_string(label_x, area.y, "255", Style::default());
    if area.height > 2 {
        buf.set_string(label_x, area.y + area.height / 2, "128", Style::default());
    }
    buf.set_string(label_x, area.y + area.height - 1, "0", Style::default());
}
