use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Write;

use super::glyph::{render_glyph, GLYPH_HEIGHT, GLYPH_PIXELS, GLYPH_WIDTH};
use super::*;

const W: usize = 720;
const H: usize = 400;
const FG: u32 = 0x00AA_AAAA;
const RED: u32 = 0x00FF_0000;
const BACKSPACE: u8 = 0x08;

fn desc(width: usize, height: usize, stride: usize) -> FramebufferDesc {
    FramebufferDesc::new_32bpp(0x1000, width, height, stride, ColorMasks::XRGB)
}

fn expected_glyph(ch: u8, fg: u32, bg: u32) -> Vec<u32> {
    let mut bitmap = vec![0u32; GLYPH_PIXELS];
    render_glyph(&mut bitmap, FontRom::vga().glyph(ch), fg, bg);
    bitmap
}

fn cell(buf: &[u32], stride: usize, x: usize, y: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(GLYPH_PIXELS);
    for row in 0..GLYPH_HEIGHT {
        let start = (y + row) * stride + x;
        out.extend_from_slice(&buf[start..start + GLYPH_WIDTH]);
    }
    out
}

#[test]
fn init_clears_visible_buffer() {
    let mut front = vec![0xFFFF_FFFF; W * H];
    let mut back = vec![0x1234_5678; W * H];
    let con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();
    assert!(con.is_double_buffered());
    assert_eq!(con.grid(), (80, 25));
    assert_eq!(con.cursor(), (0, 0));
    assert_eq!(con.pixel_cursor(), Position::new(2, 0));
    assert_eq!(con.dirty_rect(), None);
    assert!(con.visible().iter().all(|&px| px == 0));
}

#[test]
fn first_glyphs_land_after_the_leading_cell() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.put_string("AB\n");

    assert_eq!(con.cursor(), (0, 1));
    assert_eq!(con.pixel_cursor(), Position::new(0, 16));
    let visible = con.visible();
    assert_eq!(cell(visible, W, 9, 0), expected_glyph(b'A', FG, 0));
    assert_eq!(cell(visible, W, 18, 0), expected_glyph(b'B', FG, 0));
    assert!(cell(visible, W, 0, 0).iter().all(|&px| px == 0));
    assert_eq!(con.dirty_rect(), None);
}

#[test]
fn rect_reaches_screen_on_partial_refresh() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.draw_rect(Position::new(10, 10), Position::new(19, 19), RED);
    assert_eq!(con.dirty_rect(), Some(DirtyRect::new(10, 10, 20, 20)));
    assert_eq!(con.visible()[10 * W + 10], 0);

    con.partial_refresh();
    assert_eq!(con.dirty_rect(), None);
    for y in 0..H {
        for x in 0..W {
            let inside = (10..20).contains(&x) && (10..20).contains(&y);
            let want = if inside { RED } else { 0 };
            assert_eq!(con.visible()[y * W + x], want, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn dirty_rect_encloses_every_change() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.draw_rect(Position::new(40, 30), Position::new(60, 35), RED);
    con.draw_char(b'K', 300, 200, FG);
    con.draw_pixel(700, 390, 0x0000_FF00);
    con.draw_char(b'W', 715, 395, FG);

    let rect = con.dirty_rect().expect("dirty after drawing");
    let back = con.back_buffer().unwrap();
    for y in 0..H {
        for x in 0..W {
            if back[y * W + x] != con.visible()[y * W + x] {
                assert!(rect.contains_point(x, y), "({x}, {y}) outside {rect:?}");
            }
        }
    }
    assert_eq!(rect.x1, W);
    assert_eq!(rect.y1, H);
}

#[test]
fn refresh_is_idempotent() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.put_string_color("status", RED);
    con.draw_rect(Position::new(100, 100), Position::new(140, 120), FG);
    con.partial_refresh();
    let once = con.visible().to_vec();
    assert_eq!(&once[..], con.back_buffer().unwrap());

    con.partial_refresh();
    assert_eq!(con.visible(), &once[..]);
    con.refresh();
    assert_eq!(con.visible(), &once[..]);
    assert_eq!(con.dirty_rect(), None);
}

#[test]
fn cursor_advances_and_wraps() {
    let mut front = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, None, FontRom::vga()).unwrap();

    con.move_to(5, 3);
    con.put_char(b'x', FG);
    assert_eq!(con.cursor(), (6, 3));

    con.move_to(79, 3);
    con.put_char(b'y', FG);
    assert_eq!(con.cursor(), (1, 4));
    assert_eq!(con.pixel_cursor(), Position::new(9, 64));
}

#[test]
fn scroll_moves_rows_up_and_blanks_the_last() {
    const SW: usize = 90;
    const SH: usize = 48;
    const STRIDE: usize = 96;
    let mut front = vec![0u32; STRIDE * SH];
    let mut back = vec![0u32; STRIDE * SH];
    let mut con = Console::new(desc(SW, SH, STRIDE), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();
    assert_eq!(con.grid(), (10, 3));

    con.put_string("hello\nworld\nagain");
    assert_eq!(con.cursor(), (5, 2));
    let before = con.back_buffer().unwrap().to_vec();

    con.move_to(9, 2);
    con.put_char(b'Z', FG);
    assert_eq!(con.cursor(), (1, 2));

    let after = con.back_buffer().unwrap();
    assert_eq!(&after[..32 * STRIDE], &before[16 * STRIDE..]);
    assert_eq!(&con.visible()[..32 * STRIDE], &before[16 * STRIDE..]);
    for y in 32..SH {
        for x in 0..SW {
            if (9..18).contains(&x) {
                continue;
            }
            assert_eq!(after[y * STRIDE + x], 0, "pixel ({x}, {y})");
        }
    }
    assert_eq!(cell(after, STRIDE, 9, 32), expected_glyph(b'Z', FG, 0));
}

#[test]
fn glyph_cache_counts_hits_and_fills() {
    let mut front = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, None, FontRom::vga()).unwrap();

    let start = con.cache_timestamp();
    con.put_char(b'q', FG);
    con.put_char(b'q', FG);
    assert_eq!(con.cache_timestamp(), start.wrapping_add(2));
    assert!(con.glyph_entry(b'q').valid);
    assert_eq!(con.glyph_entry(b'q').fg, FG);

    con.put_char(b'q', RED);
    assert_eq!(con.glyph_entry(b'q').fg, RED);
    assert_eq!(cell(con.visible(), W, 27, 0), expected_glyph(b'q', RED, 0));
}

#[test]
fn backspace_at_origin_changes_nothing() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.put_char(BACKSPACE, FG);
    assert_eq!(con.cursor(), (0, 0));
    assert_eq!(con.dirty_rect(), None);
    assert!(con.visible().iter().all(|&px| px == 0));

    con.put_string("ab");
    con.put_char(BACKSPACE, FG);
    assert_eq!(con.cursor(), (1, 0));
    assert_eq!(cell(con.visible(), W, 18, 0), expected_glyph(b'b', FG, 0));
}

#[test]
fn control_bytes_move_the_cursor() {
    let mut front = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, None, FontRom::vga()).unwrap();

    con.move_to(5, 2);
    con.put_char(b'\r', FG);
    assert_eq!(con.cursor(), (0, 2));
    assert_eq!(con.pixel_cursor(), Position::new(0, 32));

    con.move_to(0, 0);
    con.put_char(b'\t', FG);
    assert_eq!(con.cursor(), (8, 0));

    con.move_to(3, 4);
    assert_eq!(con.pixel_cursor(), Position::new(27, 64));
}

#[test]
fn pixels_are_clipped_and_tracked() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.draw_pixel(5, 7, RED);
    assert_eq!(con.get_pixel(5, 7), RED);
    assert_eq!(con.dirty_rect(), Some(DirtyRect::new(5, 7, 6, 8)));

    con.draw_pixel(W, 7, RED);
    con.draw_pixel(5, H + 3, RED);
    assert_eq!(con.dirty_rect(), Some(DirtyRect::new(5, 7, 6, 8)));
    assert_eq!(con.get_pixel(W, 0), 0);
    assert_eq!(con.get_pixel(0, H), 0);
}

#[test]
fn clear_color_repaints_and_resets() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.put_string("text");
    con.clear_color(0x0012_3456);
    assert_eq!(con.cursor(), (0, 0));
    assert_eq!(con.pixel_cursor(), Position::new(2, 0));
    assert_eq!(con.back_color(), 0x0012_3456);
    assert_eq!(con.dirty_rect(), Some(DirtyRect::new(0, 0, W, H)));

    con.partial_refresh();
    assert!(con.visible().iter().all(|&px| px == 0x0012_3456));
}

#[test]
fn invoke_area_walks_rows_in_order() {
    let mut seen = Vec::new();
    invoke_area(Position::new(1, 1), Position::new(2, 2), |p| seen.push((p.x, p.y)));
    assert_eq!(seen, [(1, 1), (2, 1), (1, 2), (2, 2)]);
}

#[test]
fn direct_mode_draws_on_screen() {
    let mut front = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, None, FontRom::vga()).unwrap();
    assert!(!con.is_double_buffered());

    con.draw_rect(Position::new(0, 0), Position::new(3, 3), RED);
    assert_eq!(con.visible()[3 * W + 3], RED);
    con.partial_refresh();
    assert_eq!(con.dirty_rect(), None);
    assert_eq!(con.set_double_buffering(true), Err(VideoError::NoBackBuffer));
}

#[test]
fn toggling_double_buffering() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    assert_eq!(con.set_double_buffering(false), Ok(false));
    con.draw_rect(Position::new(50, 50), Position::new(60, 60), RED);
    assert_eq!(con.visible()[55 * W + 55], RED);

    assert_eq!(con.set_double_buffering(true), Ok(true));
    assert_eq!(con.back_buffer().unwrap(), con.visible());
    assert_eq!(con.dirty_rect(), None);
    assert_eq!(con.set_double_buffering(true), Ok(true));
}

#[test]
fn info_reports_geometry_and_state() {
    let mut front = vec![0u32; 768 * H];
    let mut con = Console::new(desc(W, H, 768), &mut front, None, FontRom::vga()).unwrap();
    con.put_string("ok");

    let info = con.info();
    assert_eq!(info.framebuffer, 0x1000);
    assert_eq!((info.width, info.height, info.stride), (W, H, 768));
    assert_eq!((info.c_width, info.c_height), (80, 25));
    assert_eq!((info.cx, info.cy), (2, 0));
    assert_eq!((info.fore_color, info.back_color), (FG, 0));
    assert_eq!(info.bpp, 32);
    assert_eq!(info.masks, ColorMasks::XRGB);
    assert!(info.edid.is_none());
}

#[test]
fn formats_through_fmt_write() {
    let mut front = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, None, FontRom::vga()).unwrap();
    write!(con, "{}", 42).unwrap();
    assert_eq!(con.cursor(), (2, 0));
    assert_eq!(cell(con.visible(), W, 9, 0), expected_glyph(b'4', FG, 0));
}

#[test]
fn rejects_unusable_framebuffers() {
    let mut front = vec![0u32; W * H];

    let mut deep = desc(W, H, W);
    deep.bpp = 24;
    deep.pitch = W * 3;
    assert_eq!(
        Console::new(deep, &mut front, None, FontRom::vga()).err(),
        Some(VideoError::UnsupportedDepth(24))
    );

    assert_eq!(
        Console::new(desc(W, H, W), &mut front[..W * H - 1], None, FontRom::vga()).err(),
        Some(VideoError::BufferTooSmall)
    );

    assert_eq!(
        Console::new(desc(8, H, 8), &mut front, None, FontRom::vga()).err(),
        Some(VideoError::ScreenTooSmall)
    );
}

#[test]
fn short_back_buffer_is_dropped() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H / 2];
    let con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();
    assert!(!con.is_double_buffered());
    assert!(con.back_buffer().is_none());
}

#[test]
fn back_buffer_pool_is_claimed_once() {
    assert!(claim_back_buffer(BACK_BUFFER_BYTES).is_none());
    let pool = claim_back_buffer(64).expect("first claim");
    assert_eq!(pool.len(), 64);
    assert!(pool.iter().all(|&w| w == 0));
    assert!(claim_back_buffer(64).is_none());
}

#[test]
fn global_console() {
    let front: &'static mut [u32] = Box::leak(vec![0u32; W * H].into_boxed_slice());
    let back: &'static mut [u32] = Box::leak(vec![0u32; W * H].into_boxed_slice());
    install(Console::new(desc(W, H, W), front, Some(back), FontRom::vga()).unwrap());
    assert!(is_ready());

    put_string("hi");
    tty_write(b'!');
    let info = get_info();
    assert_eq!((info.cx, info.cy), (3, 0));

    draw_rect(Position::new(0, 100), Position::new(9, 109), RED);
    assert_eq!(get_pixel(5, 105), RED);
    partial_refresh();
    with_console(|c| {
        assert_eq!(c.visible()[105 * W + 5], RED);
        assert_eq!(cell(c.visible(), W, 27, 0), expected_glyph(b'!', FG, 0));
    });
}

#[test]
fn oversized_rect_is_clipped_and_tracked() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.draw_rect(Position::new(0, 0), Position::new(usize::MAX, 3), RED);
    assert_eq!(con.dirty_rect(), Some(DirtyRect::new(0, 0, W, 4)));

    con.partial_refresh();
    assert_eq!(con.visible()[3 * W + W - 1], RED);
    assert_eq!(con.visible()[4 * W], 0);
}

#[test]
fn newline_on_last_row_scrolls_on_next_glyph() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    con.move_to(3, 24);
    con.put_char(b'x', FG);
    con.put_char(b'\n', FG);
    assert_eq!(con.cursor(), (0, 25));
    assert_eq!(cell(con.back_buffer().unwrap(), W, 36, 384), expected_glyph(b'x', FG, 0));

    con.put_string("y");
    assert_eq!(con.cursor(), (1, 24));
    let visible = con.visible();
    assert_eq!(cell(visible, W, 36, 368), expected_glyph(b'x', FG, 0));
    assert_eq!(cell(visible, W, 9, 384), expected_glyph(b'y', FG, 0));
    assert!(cell(visible, W, 36, 384).iter().all(|&px| px == 0));
}

#[test]
fn redrawing_a_glyph_hits_the_cache() {
    let mut front = vec![0u32; W * H];
    let mut back = vec![0u32; W * H];
    let mut con = Console::new(desc(W, H, W), &mut front, Some(&mut back[..]), FontRom::vga()).unwrap();

    let start = con.cache_timestamp();
    con.draw_char(b'M', 100, 100, FG);
    let first = cell(con.back_buffer().unwrap(), W, 100, 100);
    con.draw_char(b'M', 100, 100, FG);
    let second = cell(con.back_buffer().unwrap(), W, 100, 100);

    assert_eq!(con.cache_timestamp(), start.wrapping_add(2));
    assert_eq!(first, second);
    assert_eq!(first, expected_glyph(b'M', FG, 0));
    assert_eq!(con.glyph_entry(b'M').timestamp, con.cache_timestamp());
}
