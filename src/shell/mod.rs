//! Interactive shell: line editing, tab completion, command dispatch.
//!
//! The shell never blocks on input. The main loop feeds it one decoded
//! character at a time through [`handle_char`]; a mode flag switches the
//! same feed between command-line editing and the modal text editor.

use core::str;

use spin::Mutex;

use crate::drivers::timer;
use crate::drivers::vga_buffer::{self, Color};
use crate::fs;
use crate::fs::store::{FileKind, FsError, MAX_FILE_SIZE, MAX_NAME_LEN};
use crate::mm;
use crate::power;
use crate::{print, println};

const LINE_SIZE: usize = 256;
const PROMPT: &str = "riven> ";

const COMMANDS: &[&str] = &[
    "about", "cat", "clear", "colors", "create", "delete", "echo", "edit", "fsinfo", "help", "ls",
    "memory", "memtest", "reboot", "sleep", "sysinfo", "time", "uptime", "version",
];

struct Shell {
    line: [u8; LINE_SIZE],
    len: usize,
    editing: bool,
    edit_name: [u8; MAX_NAME_LEN + 1],
    edit_name_len: usize,
    edit_buf: [u8; MAX_FILE_SIZE],
    edit_len: usize,
}

impl Shell {
    const fn new() -> Shell {
        Shell {
            line: [0; LINE_SIZE],
            len: 0,
            editing: false,
            edit_name: [0; MAX_NAME_LEN + 1],
            edit_name_len: 0,
            edit_buf: [0; MAX_FILE_SIZE],
            edit_len: 0,
        }
    }
}

static SHELL: Mutex<Shell> = Mutex::new(Shell::new());

pub fn init() {
    vga_buffer::set_color(Color::LightGreen, Color::Black);
    println!();
    println!("rivenOS Shell v0.1");
    println!("Type 'help' for available commands");
    println!();
    print_prompt();
}

fn print_prompt() {
    vga_buffer::set_color(Color::LightCyan, Color::Black);
    print!("{}", PROMPT);
    vga_buffer::set_color(Color::White, Color::Black);
}

/// Feeds one decoded key into the shell. Main-loop context only.
pub fn handle_char(c: char) {
    let mut shell = SHELL.lock();
    if shell.editing {
        edit_char(&mut shell, c);
    } else {
        command_char(&mut shell, c);
    }
}

fn command_char(shell: &mut Shell, c: char) {
    match c {
        '\n' | '\r' => {
            println!();
            let len = shell.len;
            let mut buf = [0u8; LINE_SIZE];
            buf[..len].copy_from_slice(&shell.line[..len]);
            shell.len = 0;
            let line = str::from_utf8(&buf[..len]).unwrap_or("");
            execute(shell, line);
            if !shell.editing {
                print_prompt();
            }
        }
        '\x08' | '\x7f' => {
            if shell.len > 0 {
                shell.len -= 1;
                vga_buffer::backspace();
            }
        }
        '\t' => tab_complete(shell),
        c if c.is_ascii() && !c.is_ascii_control() => {
            if shell.len < LINE_SIZE - 1 {
                shell.line[shell.len] = c as u8;
                shell.len += 1;
                vga_buffer::put_char(c);
            }
        }
        _ => {}
    }
}

fn tab_complete(shell: &mut Shell) {
    let len = shell.len;
    if len == 0 {
        return;
    }
    let mut buf = [0u8; LINE_SIZE];
    buf[..len].copy_from_slice(&shell.line[..len]);
    let prefix = match str::from_utf8(&buf[..len]) {
        Ok(s) => s,
        Err(_) => return,
    };

    let mut matches = COMMANDS.iter().filter(|c| c.starts_with(prefix));
    let first = match matches.next() {
        Some(c) => *c,
        None => return,
    };

    if matches.next().is_none() {
        // Single match: type out the remainder plus a separating space.
        for &b in &first.as_bytes()[len..] {
            if shell.len < LINE_SIZE - 2 {
                shell.line[shell.len] = b;
                shell.len += 1;
                vga_buffer::put_char(b as char);
            }
        }
        if shell.len < LINE_SIZE - 1 {
            shell.line[shell.len] = b' ';
            shell.len += 1;
            vga_buffer::put_char(' ');
        }
    } else {
        println!();
        vga_buffer::set_color(Color::LightCyan, Color::Black);
        for candidate in COMMANDS.iter().filter(|c| c.starts_with(prefix)) {
            print!("{}  ", candidate);
        }
        println!();
        vga_buffer::set_color(Color::White, Color::Black);
        print_prompt();
        print!("{}", prefix);
    }
}

fn execute(shell: &mut Shell, line: &str) {
    let trimmed = line.trim();
    let (cmd, arg) = match trimmed.find(' ') {
        Some(i) => (&trimmed[..i], trimmed[i + 1..].trim_start()),
        None => (trimmed, ""),
    };

    match cmd {
        "" => {}
        "help" => help(),
        "clear" => vga_buffer::clear(),
        "echo" => println!("{}", arg),
        "about" => about(),
        "version" => version(),
        "time" => time(),
        "uptime" => uptime(),
        "sleep" => sleep(),
        "colors" => colors(),
        "memory" => memory(),
        "memtest" => memtest(),
        "ls" => ls(),
        "fsinfo" => fsinfo(),
        "sysinfo" => sysinfo(),
        "cat" => cat(arg),
        "create" => create(arg),
        "delete" => delete(arg),
        "edit" => edit(shell, arg),
        "reboot" => reboot(),
        _ => unknown(cmd),
    }
}

fn usage(text: &str) {
    vga_buffer::set_color(Color::LightRed, Color::Black);
    println!("Usage: {}", text);
    vga_buffer::set_color(Color::White, Color::Black);
}

fn print_error(err: FsError) {
    vga_buffer::set_color(Color::LightRed, Color::Black);
    println!("Error: {}", err);
    vga_buffer::set_color(Color::White, Color::Black);
}

fn help() {
    vga_buffer::set_color(Color::Yellow, Color::Black);
    println!("Available commands:");
    vga_buffer::set_color(Color::White, Color::Black);
    println!("  help           - Show this help message");
    println!("  clear          - Clear the screen");
    println!("  echo <text>    - Echo text back");
    println!("  about          - Show system information");
    println!("  version        - Show kernel version");
    println!("  time           - Show system uptime");
    println!("  uptime         - Show detailed system uptime");
    println!("  sleep          - Sleep for 2 seconds (demo)");
    println!("  colors         - Show color test");
    println!("  memory         - Show memory statistics");
    println!("  memtest        - Test memory allocation");
    println!("  ls             - List files in the file store");
    println!("  cat <file>     - Display file contents");
    println!("  create <file>  - Create a new file");
    println!("  delete <file>  - Delete a file");
    println!("  edit <file>    - Edit file contents");
    println!("  fsinfo         - Show file store information");
    println!("  sysinfo        - Show complete system info");
    println!("  reboot         - Restart the system");
}

fn about() {
    vga_buffer::set_color(Color::LightGreen, Color::Black);
    println!("rivenOS - a hobby operating system");
    vga_buffer::set_color(Color::White, Color::Black);
    println!("Version: 0.1.0");
    println!("Features: VGA display, keyboard, shell, timer, memory, file store");
    println!("Architecture: x86_64");
    println!("Kernel: Rust");
}

fn version() {
    vga_buffer::set_color(Color::LightGreen, Color::Black);
    println!("rivenOS kernel 0.1.0");
    vga_buffer::set_color(Color::White, Color::Black);
    println!("Features: timer, interrupts, shell, memory, file store");
}

fn time() {
    let ticks = timer::ticks();
    let seconds = ticks / timer::TICK_HZ;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    vga_buffer::set_color(Color::LightCyan, Color::Black);
    print!("System uptime: ");
    if hours > 0 {
        print!("{}h ", hours);
    }
    if minutes % 60 > 0 || hours > 0 {
        print!("{}m ", minutes % 60);
    }
    println!("{}s", seconds % 60);
    println!("Total ticks: {}", ticks);
    vga_buffer::set_color(Color::White, Color::Black);
}

fn uptime() {
    let ticks = timer::ticks();
    let seconds = ticks / timer::TICK_HZ;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    vga_buffer::set_color(Color::LightCyan, Color::Black);
    println!("System Uptime Details:");
    vga_buffer::set_color(Color::White, Color::Black);

    print!("Total uptime: ");
    if days > 0 {
        print!("{} days, ", days);
    }
    if hours % 24 > 0 {
        print!("{} hours, ", hours % 24);
    }
    println!("{} minutes, {} seconds", minutes % 60, seconds % 60);
    println!("Timer ticks: {} ({}Hz)", ticks, timer::TICK_HZ);
}

fn sleep() {
    vga_buffer::set_color(Color::Yellow, Color::Black);
    println!("Sleeping for 2 seconds...");
    timer::sleep_ms(2000);
    println!("Done sleeping!");
    vga_buffer::set_color(Color::White, Color::Black);
}

fn colors() {
    vga_buffer::set_color(Color::LightRed, Color::Black);
    print!("RED ");
    vga_buffer::set_color(Color::LightGreen, Color::Black);
    print!("GREEN ");
    vga_buffer::set_color(Color::LightBlue, Color::Black);
    print!("BLUE ");
    vga_buffer::set_color(Color::Yellow, Color::Black);
    print!("YELLOW ");
    vga_buffer::set_color(Color::LightCyan, Color::Black);
    print!("CYAN ");
    vga_buffer::set_color(Color::Pink, Color::Black);
    print!("MAGENTA");
    vga_buffer::set_color(Color::White, Color::Black);
    println!();
}

fn memory() {
    match mm::with_heap(|heap| (heap.total(), heap.used(), heap.free_bytes())) {
        Some((total, used, free)) => {
            vga_buffer::set_color(Color::LightCyan, Color::Black);
            println!("Memory Statistics:");
            vga_buffer::set_color(Color::White, Color::Black);
            println!("Total heap size: {} KB", total / 1024);
            println!("Used memory: {} bytes", used);
            println!("Free memory: {} bytes", free);
            println!("Usage: {}%", used as u64 * 100 / total as u64);
        }
        None => {
            vga_buffer::set_color(Color::LightRed, Color::Black);
            println!("Memory manager not initialized!");
            vga_buffer::set_color(Color::White, Color::Black);
        }
    }
}

fn memtest() {
    vga_buffer::set_color(Color::LightCyan, Color::Black);
    println!("Memory Allocation Test:");
    vga_buffer::set_color(Color::White, Color::Black);

    let first = mm::alloc(1024);
    report_alloc("Allocated 1024 bytes at", first);
    let second = mm::alloc(2048);
    report_alloc("Allocated 2048 bytes at", second);

    println!("Freeing first allocation...");
    mm::free(first);
    println!("Freeing second allocation...");
    mm::free(second);
    println!("Memory test complete!");
}

fn report_alloc(label: &str, ptr: *mut u8) {
    if ptr.is_null() {
        vga_buffer::set_color(Color::LightRed, Color::Black);
        println!("{}: allocation failed!", label);
        vga_buffer::set_color(Color::White, Color::Black);
    } else {
        println!("{}: {:#010x}", label, ptr as usize);
    }
}

fn ls() {
    vga_buffer::set_color(Color::LightCyan, Color::Black);
    println!("Directory Listing:");
    vga_buffer::set_color(Color::White, Color::Black);

    let result = fs::with_store(|fs| {
        let mut found = false;
        for info in fs.iter() {
            found = true;
            let color = match info.kind {
                FileKind::Directory => Color::LightBlue,
                FileKind::Regular => Color::White,
            };
            vga_buffer::set_color(color, Color::Black);
            print!("[{}]", info.kind.label());
            vga_buffer::set_color(Color::White, Color::Black);
            println!(" {} ({} bytes)", info.name, info.size);
        }
        Ok(found)
    });

    match result {
        Ok(true) => {}
        Ok(false) => {
            vga_buffer::set_color(Color::Yellow, Color::Black);
            println!("No files found.");
            vga_buffer::set_color(Color::White, Color::Black);
        }
        Err(err) => print_error(err),
    }
}

fn fsinfo() {
    let result = fs::with_store(|fs| {
        Ok((
            fs.used_files(),
            fs.total_files(),
            fs.used_size(),
            fs.total_size(),
        ))
    });
    match result {
        Ok((used_files, total_files, used_size, total_size)) => {
            vga_buffer::set_color(Color::LightCyan, Color::Black);
            println!("File System Information:");
            vga_buffer::set_color(Color::White, Color::Black);
            println!("Total files: {} / Used: {}", total_files, used_files);
            println!("Total space: {} bytes / Used: {} bytes", total_size, used_size);
            println!("Free space: {} bytes", total_size - used_size);
        }
        Err(err) => print_error(err),
    }
}

fn sysinfo() {
    vga_buffer::set_color(Color::LightCyan, Color::Black);
    println!("rivenOS System Information:");
    vga_buffer::set_color(Color::White, Color::Black);

    println!("OS Name: rivenOS");
    println!("Version: 0.1.0");
    println!("Architecture: x86_64");
    println!("Kernel: Rust");
    println!();
    println!("Hardware:");
    println!("  CPU: x86_64 compatible");
    println!("  Memory: {} MB heap + system", mm::HEAP_SIZE / (1024 * 1024));
    println!("  Display: VGA Text Mode 80x25");
    println!("  Timer: PIT {}Hz", timer::TICK_HZ);
    println!();
    println!("Features:");
    println!("  - Interrupt-driven I/O");
    println!("  - Memory management");
    println!("  - File store (in-memory)");
    println!("  - Shell with tab completion");
    println!("  - Text editor");
}

fn cat(arg: &str) {
    if arg.is_empty() {
        usage("cat <filename>");
        return;
    }
    let result = fs::with_store(|fs| {
        let handle = fs.open(arg)?;
        let mut buf = [0u8; MAX_FILE_SIZE];
        let count = fs.read(handle, &mut buf)?;
        fs.close(handle);

        vga_buffer::set_color(Color::LightCyan, Color::Black);
        println!("Content of {}:", arg);
        vga_buffer::set_color(Color::White, Color::Black);
        if count == 0 {
            println!("File is empty.");
            return Ok(());
        }
        match str::from_utf8(&buf[..count]) {
            Ok(text) => {
                vga_buffer::print(text);
                if !text.ends_with('\n') {
                    println!();
                }
            }
            Err(_) => println!("(binary file, {} bytes)", count),
        }
        Ok(())
    });
    if let Err(err) = result {
        print_error(err);
    }
}

fn create(arg: &str) {
    if arg.is_empty() {
        usage("create <filename>");
        return;
    }
    let result = fs::with_store(|fs| {
        fs.create(arg, FileKind::Regular, timer::ticks())?;
        let handle = fs.open(arg)?;
        fs.write(
            handle,
            b"New file created by rivenOS!\nEdit this file with 'edit <filename>'",
        )?;
        fs.close(handle);
        Ok(())
    });
    match result {
        Ok(()) => {
            vga_buffer::set_color(Color::LightGreen, Color::Black);
            println!("Created file '{}' successfully!", arg);
            vga_buffer::set_color(Color::White, Color::Black);
        }
        Err(err) => print_error(err),
    }
}

fn delete(arg: &str) {
    if arg.is_empty() {
        usage("delete <filename>");
        return;
    }
    match fs::with_store(|fs| fs.delete(arg)) {
        Ok(()) => {
            vga_buffer::set_color(Color::LightGreen, Color::Black);
            println!("Deleted file '{}' successfully!", arg);
            vga_buffer::set_color(Color::White, Color::Black);
        }
        Err(err) => print_error(err),
    }
}

fn edit(shell: &mut Shell, arg: &str) {
    if arg.is_empty() {
        usage("edit <filename>");
        return;
    }
    if arg.len() > MAX_NAME_LEN {
        print_error(FsError::NameTooLong);
        return;
    }
    shell.edit_name = [0; MAX_NAME_LEN + 1];
    shell.edit_name[..arg.len()].copy_from_slice(arg.as_bytes());
    shell.edit_name_len = arg.len();
    shell.edit_len = 0;
    shell.editing = true;

    vga_buffer::set_color(Color::LightCyan, Color::Black);
    println!("Simple text editor for: {}", arg);
    vga_buffer::set_color(Color::White, Color::Black);
    println!("Type your text (press ESC when done):");
    println!("---");
}

fn edit_char(shell: &mut Shell, c: char) {
    match c {
        '\x1b' => {
            println!();
            save_edit(shell);
            shell.editing = false;
            print_prompt();
        }
        '\n' | '\r' => {
            if shell.edit_len < MAX_FILE_SIZE {
                shell.edit_buf[shell.edit_len] = b'\n';
                shell.edit_len += 1;
                println!();
            }
        }
        '\x08' | '\x7f' => {
            if shell.edit_len > 0 {
                shell.edit_len -= 1;
                vga_buffer::backspace();
            }
        }
        c if c.is_ascii() && !c.is_ascii_control() => {
            if shell.edit_len < MAX_FILE_SIZE {
                shell.edit_buf[shell.edit_len] = c as u8;
                shell.edit_len += 1;
                vga_buffer::put_char(c);
            }
        }
        _ => {}
    }
}

fn save_edit(shell: &mut Shell) {
    let name_buf = shell.edit_name;
    let name = str::from_utf8(&name_buf[..shell.edit_name_len]).unwrap_or("");
    let content = &shell.edit_buf[..shell.edit_len];

    let result = fs::with_store(|fs| {
        if fs.exists(name) {
            fs.delete(name)?;
        }
        fs.create(name, FileKind::Regular, timer::ticks())?;
        let handle = fs.open(name)?;
        fs.write(handle, content)?;
        fs.close(handle);
        Ok(())
    });
    match result {
        Ok(()) => {
            vga_buffer::set_color(Color::LightGreen, Color::Black);
            println!("File '{}' saved successfully!", name);
            vga_buffer::set_color(Color::White, Color::Black);
        }
        Err(err) => print_error(err),
    }
}

fn reboot() {
    vga_buffer::set_color(Color::LightRed, Color::Black);
    println!("Rebooting system...");
    power::reboot();
}

fn unknown(cmd: &str) {
    vga_buffer::set_color(Color::LightRed, Color::Black);
    println!("Unknown command: {}", cmd);
    vga_buffer::set_color(Color::White, Color::Black);
    println!("Type 'help' for available commands");
}
